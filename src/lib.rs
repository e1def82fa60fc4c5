//! # mount-cache
//!
//! Cached mount points for managed network devices.
//!
//! For every device configured in the cached mount-point topology, this
//! crate resolves the device's capability strings into a compiled schema
//! model (served from an in-process repository backed by an on-disk
//! cache), binds a pair of pooled in-memory stores to the device's mount
//! path, and publishes a mount point whose data broker runs transactions
//! with a three-phase commit. An HTTP and WebSocket surface exposes the
//! topology, the active mount points and their data.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP, WebSocket)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── WS Handler (ws/)
//!     │
//!     ├── TopologyStore ──► MountPointManager (service/)
//!     ├── EventBus (domain/)
//!     │
//!     ├── Capability resolver + SchemaCache (schema/)
//!     ├── MountPointService + records (mount/)
//!     ├── DataBroker + three-phase commit (tx/)
//!     │
//!     └── StorePool of InMemoryStores (store/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod mount;
pub mod schema;
pub mod service;
pub mod store;
pub mod tx;
pub mod ws;
