//! Schema layer: capability parsing, source caching and model compilation.
//!
//! A device's capability strings are parsed into
//! [`CapabilityDescriptor`]s, whose sources are fetched from the two-tier
//! [`SchemaCache`] and compiled into an immutable [`SchemaModel`].

pub mod cache;
pub mod capability;
pub mod loader;
pub mod model;
pub mod parser;
pub mod repository;
pub mod source;

pub use cache::SchemaCache;
pub use capability::{CapabilityAnomaly, CapabilityDescriptor, ResolvedCapabilities, resolve_capabilities};
pub use loader::{LoadModelsOutcome, load_models};
pub use model::{ModuleImport, ModuleSchema, SchemaModel};
pub use repository::SourceRepository;
pub use source::{SchemaSource, SourceIdentifier};
