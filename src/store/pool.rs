//! Keyed pool of in-memory stores.
//!
//! [`StorePool`] memoizes one [`InMemoryStore`] per (mount path, store kind).
//! Stores are built lazily on first access and live until the mount point
//! that owns them is torn down; the pool never evicts on its own.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::{InMemoryStore, StaticSchemaService, StoreKind};
use crate::domain::MountPath;
use crate::schema::SchemaModel;

type StoreKey = (MountPath, StoreKind);

/// Process-wide registry of pooled stores.
///
/// # Concurrency
///
/// - Lookups of existing stores take only the read lock.
/// - First access takes the write lock and re-checks before building, so
///   concurrent first accesses to one key construct exactly one store.
#[derive(Debug, Default)]
pub struct StorePool {
    stores: RwLock<HashMap<StoreKey, Arc<InMemoryStore>>>,
    created: AtomicU64,
}

impl StorePool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the store for `(mount_path, kind)`, building it on first use.
    ///
    /// `schema` is only consulted when the store is built.
    pub async fn get_or_create(
        &self,
        mount_path: &MountPath,
        schema: &Arc<SchemaModel>,
        kind: StoreKind,
    ) -> Arc<InMemoryStore> {
        let key = (mount_path.clone(), kind);
        if let Some(store) = self.stores.read().await.get(&key) {
            return Arc::clone(store);
        }

        let mut stores = self.stores.write().await;
        if let Some(store) = stores.get(&key) {
            return Arc::clone(store);
        }
        let name = store_name(mount_path, kind);
        let store = Arc::new(InMemoryStore::new(
            name.clone(),
            kind,
            Arc::new(StaticSchemaService::new(Arc::clone(schema))),
        ));
        stores.insert(key, Arc::clone(&store));
        self.created.fetch_add(1, Ordering::Relaxed);
        tracing::info!(store = %name, "created pooled in-memory store");
        store
    }

    /// Returns the store for `(mount_path, kind)` if it was built.
    pub async fn get(&self, mount_path: &MountPath, kind: StoreKind) -> Option<Arc<InMemoryStore>> {
        self.stores
            .read()
            .await
            .get(&(mount_path.clone(), kind))
            .map(Arc::clone)
    }

    /// Drops both stores of a mount path. Returns how many were removed.
    pub async fn remove_mount(&self, mount_path: &MountPath) -> usize {
        let mut stores = self.stores.write().await;
        let removed = StoreKind::ALL
            .iter()
            .filter(|kind| stores.remove(&(mount_path.clone(), **kind)).is_some())
            .count();
        if removed > 0 {
            tracing::debug!(%mount_path, removed, "released pooled stores");
        }
        removed
    }

    /// Returns how many stores the pool has ever built.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Returns the number of live stores.
    pub async fn len(&self) -> usize {
        self.stores.read().await.len()
    }

    /// Returns `true` if the pool holds no store.
    pub async fn is_empty(&self) -> bool {
        self.stores.read().await.is_empty()
    }
}

/// Returns the pooled store name for a mount path and kind.
#[must_use]
pub fn store_name(mount_path: &MountPath, kind: StoreKind) -> String {
    format!("{mount_path}-{}", kind.store_suffix())
}
