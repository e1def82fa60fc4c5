//! Two-tier schema cache.
//!
//! [`SchemaCache::resolve`] turns the module descriptors advertised by a
//! device into a compiled [`SchemaModel`]. Sources are looked up in the
//! process-wide [`SourceRepository`] first, then in the mount point's
//! on-disk cache directory `<cache-root>/<cache-directory-name>`. Every
//! source a mount point uses ends up in both tiers, so the directory can
//! rebuild the model after a restart.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;

use super::model::{ModuleSchema, SchemaModel};
use super::parser::parse_module;
use super::{CapabilityDescriptor, SchemaSource, SourceIdentifier, SourceRepository};
use crate::domain::NodeId;
use crate::error::SchemaResolutionError;

/// Default cache root, relative to the working directory.
pub const DEFAULT_CACHE_ROOT: &str = "cache/cached-mountpoint";

/// Resolves capability sets into shared schema models.
#[derive(Debug, Clone)]
pub struct SchemaCache {
    root: PathBuf,
    repository: Arc<SourceRepository>,
}

impl SchemaCache {
    /// Creates a cache rooted at `root`, backed by a shared repository.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, repository: Arc<SourceRepository>) -> Self {
        Self {
            root: root.into(),
            repository,
        }
    }

    /// Returns the on-disk cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the shared in-process repository.
    #[must_use]
    pub fn repository(&self) -> &Arc<SourceRepository> {
        &self.repository
    }

    /// Returns the on-disk directory for one mount point.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaResolutionError::InvalidCacheDirectory`] unless the
    /// name is a single, non-empty path component.
    pub fn directory_for(&self, cache_directory: &str) -> Result<PathBuf, SchemaResolutionError> {
        validate_directory_name(cache_directory)?;
        Ok(self.root.join(cache_directory))
    }

    /// Resolves `capabilities` into a compiled schema model.
    ///
    /// Runs once per mount point at creation time; the caller awaits the
    /// result before the mount point is considered ready.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaResolutionError`] when a module (or one of its
    /// imports) cannot be found, parsed, or fitted into an acyclic graph,
    /// or when the cache directory cannot be used.
    pub async fn resolve(
        &self,
        node_id: &NodeId,
        cache_directory: &str,
        capabilities: &[CapabilityDescriptor],
    ) -> Result<Arc<SchemaModel>, SchemaResolutionError> {
        let directory = self.directory_for(cache_directory)?;
        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| io_error(&directory, source))?;
        tracing::info!(
            %node_id,
            directory = %directory.display(),
            "cached mount point will use schema cache directory"
        );

        let disk = scan_directory(&directory).await?;
        let mut builder = SchemaContextBuilder {
            repository: &self.repository,
            directory,
            disk,
            compiled: BTreeMap::new(),
        };

        let mut requested = Vec::with_capacity(capabilities.len());
        for descriptor in capabilities {
            let mut chain = Vec::new();
            let id = builder
                .compile(SourceIdentifier::from(descriptor), &mut chain)
                .await?;
            if let Some(module) = builder.compiled.get(&id)
                && module.namespace != descriptor.namespace
            {
                tracing::warn!(
                    %node_id,
                    module = %id,
                    advertised = %descriptor.namespace,
                    declared = %module.namespace,
                    "capability namespace differs from module namespace"
                );
            }
            if !requested.contains(&id) {
                requested.push(id);
            }
        }

        let model = SchemaModel::new(builder.compiled, requested, capabilities.to_vec());
        tracing::info!(
            %node_id,
            modules = model.module_count(),
            "schema model resolved"
        );
        Ok(Arc::new(model))
    }
}

/// Where a fetched source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Repository,
    Disk,
}

/// Assembles the sources for one resolution and compiles them.
struct SchemaContextBuilder<'a> {
    repository: &'a SourceRepository,
    directory: PathBuf,
    disk: HashMap<SourceIdentifier, PathBuf>,
    compiled: BTreeMap<SourceIdentifier, ModuleSchema>,
}

impl SchemaContextBuilder<'_> {
    /// Compiles `wanted` and, transitively, its imports. Returns the
    /// canonical identifier (name plus declared revision).
    fn compile<'b>(
        &'b mut self,
        wanted: SourceIdentifier,
        chain: &'b mut Vec<String>,
    ) -> BoxFuture<'b, Result<SourceIdentifier, SchemaResolutionError>> {
        Box::pin(async move {
            if let Some(id) = self.compiled.keys().find(|id| id.satisfies(&wanted)) {
                return Ok(id.clone());
            }
            if chain.contains(&wanted.name) {
                chain.push(wanted.name.clone());
                return Err(SchemaResolutionError::ImportCycle(chain.join(" -> ")));
            }

            let (source, origin) = self.fetch(&wanted).await?;
            let module = parse_module(&source.id.to_string(), &source.text)?;
            if module.name != wanted.name {
                return Err(SchemaResolutionError::NameMismatch {
                    expected: wanted.to_string(),
                    found: module.name,
                });
            }
            if let Some(expected) = &wanted.revision
                && module.revision.as_ref() != Some(expected)
            {
                return Err(SchemaResolutionError::RevisionMismatch {
                    module: module.name,
                    expected: expected.clone(),
                    found: module.revision.unwrap_or_else(|| "none".to_string()),
                });
            }

            let canonical = module.source_id();
            self.repository
                .register(SchemaSource::new(canonical.clone(), Arc::clone(&source.text)))
                .await;
            if origin == Origin::Repository && !self.disk.contains_key(&canonical) {
                self.persist(&canonical, &source.text).await;
            }

            chain.push(module.name.clone());
            for import in &module.imports {
                self.compile(import.source_id(), chain).await?;
            }
            chain.pop();

            tracing::debug!(module = %canonical, "compiled schema source");
            self.compiled.insert(canonical.clone(), module);
            Ok(canonical)
        })
    }

    /// Looks a source up in memory first, then on disk.
    async fn fetch(
        &self,
        wanted: &SourceIdentifier,
    ) -> Result<(SchemaSource, Origin), SchemaResolutionError> {
        if let Some(source) = self.repository.lookup(wanted).await {
            return Ok((source, Origin::Repository));
        }

        // An undated file may still declare the wanted revision inside.
        let undated = SourceIdentifier::new(wanted.name.clone(), None);
        let on_disk = super::source::newest(self.disk.keys(), wanted)
            .or_else(|| self.disk.get_key_value(&undated).map(|(id, _)| id));
        let Some((id, path)) = on_disk.and_then(|id| self.disk.get_key_value(id)) else {
            return Err(SchemaResolutionError::MissingSource(wanted.to_string()));
        };

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| io_error(path, source))?;
        tracing::debug!(source = %id, path = %path.display(), "loaded schema source from disk");
        Ok((SchemaSource::new(id.clone(), text), Origin::Disk))
    }

    async fn persist(&mut self, id: &SourceIdentifier, text: &str) {
        let path = self.directory.join(id.file_name());
        match tokio::fs::write(&path, text).await {
            Ok(()) => {
                tracing::debug!(source = %id, path = %path.display(), "persisted schema source");
                self.disk.insert(id.clone(), path);
            }
            Err(err) => {
                tracing::warn!(source = %id, path = %path.display(), error = %err, "failed to persist schema source");
            }
        }
    }
}

/// Lists the schema sources present in a cache directory.
async fn scan_directory(
    directory: &Path,
) -> Result<HashMap<SourceIdentifier, PathBuf>, SchemaResolutionError> {
    let mut entries = tokio::fs::read_dir(directory)
        .await
        .map_err(|source| io_error(directory, source))?;
    let mut found = HashMap::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| io_error(directory, source))?
    {
        let file_name = entry.file_name();
        if let Some(id) = file_name.to_str().and_then(SourceIdentifier::from_file_name) {
            found.insert(id, entry.path());
        }
    }
    Ok(found)
}

/// Rejects names that would escape the cache root.
pub(crate) fn validate_directory_name(name: &str) -> Result<(), SchemaResolutionError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(SchemaResolutionError::InvalidCacheDirectory(name.to_string()));
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> SchemaResolutionError {
    SchemaResolutionError::Io {
        path: path.display().to_string(),
        source,
    }
}
