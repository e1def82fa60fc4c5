//! Shared application state injected into all Axum handlers.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::MountCacheConfig;
use crate::domain::{EventBus, TopologyChange, TopologyStore};
use crate::mount::MountPointService;
use crate::schema::{SchemaCache, SourceRepository};
use crate::service::MountPointManager;
use crate::store::StorePool;
use crate::tx::NotificationPool;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Lifecycle manager owning every active mount point.
    pub manager: Arc<MountPointManager>,
    /// Topology configuration store feeding the manager.
    pub topology: Arc<TopologyStore>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Root of the on-disk schema cache.
    pub schema_cache_root: PathBuf,
}

impl AppState {
    /// Wires every component from `config`.
    ///
    /// Returns the state and the topology change feed; the caller must
    /// hand the feed to [`MountPointManager::run`].
    #[must_use]
    pub fn new(config: &MountCacheConfig) -> (Self, mpsc::Receiver<Vec<TopologyChange>>) {
        let repository = Arc::new(SourceRepository::new());
        let schema_cache = SchemaCache::new(config.schema_cache_root.clone(), repository);
        let pool = Arc::new(StorePool::new());
        let notifier = Arc::new(NotificationPool::new(
            config.notification_workers,
            config.notification_queue_capacity,
        ));
        let service = Arc::new(MountPointService::new());
        let event_bus = EventBus::new(config.event_bus_capacity);

        let manager = Arc::new(MountPointManager::new(
            schema_cache,
            pool,
            notifier,
            service,
            event_bus.clone(),
        ));
        let (topology, changes) = TopologyStore::new(config.topology_channel_capacity);

        let state = Self {
            manager,
            topology: Arc::new(topology),
            event_bus,
            schema_cache_root: config.schema_cache_root.clone(),
        };
        (state, changes)
    }
}
