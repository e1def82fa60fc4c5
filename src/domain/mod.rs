//! Domain layer: device identity, topology input and the event system.
//!
//! This module contains the server-side domain model: node identity and
//! mount paths, the topology store that feeds the lifecycle manager, and
//! the event bus broadcasting mount-point state changes.

pub mod event_bus;
pub mod mount_event;
pub mod node_id;
pub mod topology;

pub use event_bus::EventBus;
pub use mount_event::MountPointEvent;
pub use node_id::{MountPath, NodeId, TOPOLOGY_NAME};
pub use topology::{ModificationKind, TopologyChange, TopologyNode, TopologyStore};
