//! Immutable, compiled schema model for one mount point.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{CapabilityDescriptor, SourceIdentifier};

/// One `import` statement of a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleImport {
    /// Imported module name.
    pub module: String,
    /// Local prefix bound to the import.
    pub prefix: Option<String>,
    /// Pinned revision, if any.
    pub revision_date: Option<String>,
}

impl ModuleImport {
    /// Returns the source identifier this import asks for.
    #[must_use]
    pub fn source_id(&self) -> SourceIdentifier {
        SourceIdentifier::new(self.module.clone(), self.revision_date.clone())
    }
}

/// Compiled summary of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSchema {
    /// Module name.
    pub name: String,
    /// Declared namespace.
    pub namespace: String,
    /// Declared prefix.
    pub prefix: String,
    /// Newest declared revision.
    pub revision: Option<String>,
    /// Imported modules.
    pub imports: Vec<ModuleImport>,
    /// Names of the module's top-level data nodes.
    pub data_nodes: BTreeSet<String>,
}

impl ModuleSchema {
    /// Returns the identifier of this module at its declared revision.
    #[must_use]
    pub fn source_id(&self) -> SourceIdentifier {
        SourceIdentifier::new(self.name.clone(), self.revision.clone())
    }
}

/// Resolved module graph of a mount point.
///
/// Built once by the schema cache and shared by reference (`Arc`) between
/// the mount point, its data broker and its pooled stores. Never mutated
/// after construction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaModel {
    /// Every compiled module, requested ones and transitive imports.
    modules: BTreeMap<SourceIdentifier, ModuleSchema>,
    /// Modules requested directly by the device's capabilities.
    requested: Vec<SourceIdentifier>,
    /// Capability descriptors the model was built from.
    capabilities: Vec<CapabilityDescriptor>,
}

impl SchemaModel {
    /// Assembles a model from compiled modules.
    #[must_use]
    pub fn new(
        modules: BTreeMap<SourceIdentifier, ModuleSchema>,
        requested: Vec<SourceIdentifier>,
        capabilities: Vec<CapabilityDescriptor>,
    ) -> Self {
        Self {
            modules,
            requested,
            capabilities,
        }
    }

    /// Returns all compiled modules.
    pub fn modules(&self) -> impl Iterator<Item = &ModuleSchema> {
        self.modules.values()
    }

    /// Returns the number of compiled modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Returns the directly requested module identifiers.
    #[must_use]
    pub fn requested(&self) -> &[SourceIdentifier] {
        &self.requested
    }

    /// Returns the capability descriptors the model was built from.
    #[must_use]
    pub fn capabilities(&self) -> &[CapabilityDescriptor] {
        &self.capabilities
    }

    /// Looks up a module by name (newest revision wins).
    #[must_use]
    pub fn module(&self, name: &str) -> Option<&ModuleSchema> {
        self.modules
            .values()
            .filter(|m| m.name == name)
            .max_by(|a, b| a.revision.cmp(&b.revision))
    }

    /// Returns `true` if `segment` names a top-level data node.
    ///
    /// Accepts a bare node name or one qualified as `module:node` or
    /// `prefix:node`.
    #[must_use]
    pub fn has_data_node(&self, segment: &str) -> bool {
        self.canonical_data_node(segment).is_some()
    }

    /// Returns the bare name of the top-level data node `segment` refers
    /// to, or `None` if the model has no such node.
    #[must_use]
    pub fn canonical_data_node<'a>(&self, segment: &'a str) -> Option<&'a str> {
        match segment.split_once(':') {
            Some((qualifier, node)) => self
                .modules
                .values()
                .any(|m| (m.name == qualifier || m.prefix == qualifier) && m.data_nodes.contains(node))
                .then_some(node),
            None => self
                .modules
                .values()
                .any(|m| m.data_nodes.contains(segment))
                .then_some(segment),
        }
    }
}
