//! Process-wide repository of schema source texts.
//!
//! [`SourceRepository`] is the in-process tier of the schema cache. A
//! module fetched once for any device is reusable by every other mount
//! point in the process.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::source::newest;
use super::{SchemaSource, SourceIdentifier};

/// Shared map of previously seen schema sources.
///
/// Mutated only by insert-if-absent: the first text registered for an
/// identifier wins and is what every later lookup observes.
#[derive(Debug, Default)]
pub struct SourceRepository {
    sources: RwLock<HashMap<SourceIdentifier, SchemaSource>>,
}

impl SourceRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source unless one is already present for its identifier.
    ///
    /// Returns the source stored in the repository after the call, which is
    /// the existing one when the identifier was already known.
    pub async fn register(&self, source: SchemaSource) -> SchemaSource {
        if let Some(existing) = self.sources.read().await.get(&source.id) {
            return existing.clone();
        }
        let mut sources = self.sources.write().await;
        sources
            .entry(source.id.clone())
            .or_insert_with(|| {
                tracing::debug!(source = %source.id, "registered schema source");
                source
            })
            .clone()
    }

    /// Returns the newest known source satisfying `wanted`.
    pub async fn lookup(&self, wanted: &SourceIdentifier) -> Option<SchemaSource> {
        let sources = self.sources.read().await;
        let id = newest(sources.keys(), wanted)?;
        sources.get(id).cloned()
    }

    /// Returns `true` if a source with exactly this identifier is known.
    pub async fn contains(&self, id: &SourceIdentifier) -> bool {
        self.sources.read().await.contains_key(id)
    }

    /// Returns the number of known sources.
    pub async fn len(&self) -> usize {
        self.sources.read().await.len()
    }

    /// Returns `true` if no source is known.
    pub async fn is_empty(&self) -> bool {
        self.sources.read().await.is_empty()
    }
}
