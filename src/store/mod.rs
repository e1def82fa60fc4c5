//! Store layer: pooled, schema-validated in-memory data stores.

pub mod cohort;
pub mod kind;
pub mod memory;
pub mod path;
pub mod pool;
pub mod schema_service;
pub mod tree;

pub use cohort::{CommitCohort, InMemoryCohort};
pub use kind::{StoreKind, UnknownStoreKind};
pub use memory::{DataChange, InMemoryStore, Modification, Snapshot, StoreWriteTransaction};
pub use path::DataPath;
pub use pool::{StorePool, store_name};
pub use schema_service::{SchemaService, SchemaSubscription, StaticSchemaService};
