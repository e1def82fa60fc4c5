//! Mount-point lifecycle: topology changes in, active mount points out.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, mpsc};

use crate::domain::{
    EventBus, ModificationKind, MountPointEvent, NodeId, TopologyChange, TopologyNode,
};
use crate::error::MountPointError;
use crate::mount::{
    MountPoint, MountPointRecord, MountPointService, MountPointSummary, Registration,
};
use crate::schema::{SchemaCache, resolve_capabilities};
use crate::store::{StoreKind, StorePool};
use crate::tx::{DataBroker, NotificationPool};

/// Outcome of [`MountPointManager::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// A new mount point was brought up.
    Created,
    /// A mount point was already active for the node; nothing changed.
    AlreadyActive,
}

/// Drives the ABSENT → ACTIVE → ABSENT lifecycle of every cached mount
/// point.
///
/// Owns the active-record set. Creation resolves the device's schema,
/// builds its broker over pooled stores and publishes the endpoint;
/// deletion releases everything in reverse. Every transition emits a
/// [`MountPointEvent`] on the [`EventBus`].
#[derive(Debug)]
pub struct MountPointManager {
    schema_cache: SchemaCache,
    pool: Arc<StorePool>,
    notifier: Arc<NotificationPool>,
    service: Arc<MountPointService>,
    event_bus: EventBus,
    records: RwLock<HashMap<NodeId, MountPointRecord>>,
}

impl MountPointManager {
    /// Creates a manager with no active mount point.
    #[must_use]
    pub fn new(
        schema_cache: SchemaCache,
        pool: Arc<StorePool>,
        notifier: Arc<NotificationPool>,
        service: Arc<MountPointService>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            schema_cache,
            pool,
            notifier,
            service,
            event_bus,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the mount-point registry.
    #[must_use]
    pub fn service(&self) -> &Arc<MountPointService> {
        &self.service
    }

    /// Returns the store pool.
    #[must_use]
    pub fn pool(&self) -> &Arc<StorePool> {
        &self.pool
    }

    /// Returns the schema cache.
    #[must_use]
    pub fn schema_cache(&self) -> &SchemaCache {
        &self.schema_cache
    }

    /// Consumes topology change batches until the sender side closes.
    ///
    /// This is the single consumer: batches, and the changes inside them,
    /// are applied strictly in order.
    pub async fn run(self: Arc<Self>, mut changes: mpsc::Receiver<Vec<TopologyChange>>) {
        tracing::info!("mount point manager started");
        while let Some(batch) = changes.recv().await {
            self.on_topology_changed(batch).await;
        }
        tracing::info!("topology change feed closed, mount point manager stopped");
    }

    /// Applies one batch of topology changes.
    pub async fn on_topology_changed(&self, changes: Vec<TopologyChange>) {
        for change in changes {
            match (change.kind, change.node) {
                (ModificationKind::Write | ModificationKind::SubtreeModified, Some(node)) => {
                    tracing::debug!(node_id = %change.node_id, kind = ?change.kind, "topology node written");
                    if let Err(err) = self.create(&node).await {
                        tracing::error!(node_id = %change.node_id, error = %err, "failed to create cached mount point");
                        self.event_bus.publish(MountPointEvent::Failed {
                            node_id: change.node_id,
                            reason: err.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                }
                (ModificationKind::Write | ModificationKind::SubtreeModified, None) => {
                    tracing::warn!(node_id = %change.node_id, "topology write without node data, ignoring");
                }
                (ModificationKind::Delete, _) => {
                    self.delete(&change.node_id).await;
                }
            }
        }
    }

    /// Brings up the mount point of `node` unless it is already active.
    ///
    /// # Errors
    ///
    /// Returns [`MountPointError::NoCapabilities`] for a node without
    /// capabilities, [`MountPointError::Schema`] if its schema cannot be
    /// resolved, or [`MountPointError::AlreadyRegistered`] if its mount path
    /// is occupied. No record is created on error.
    pub async fn create(&self, node: &TopologyNode) -> Result<CreateOutcome, MountPointError> {
        let node_id = &node.node_id;
        if self.records.read().await.contains_key(node_id) {
            tracing::warn!(%node_id, "cached mount point already active, ignoring modification");
            return Ok(CreateOutcome::AlreadyActive);
        }
        if node.capabilities.is_empty() {
            return Err(MountPointError::NoCapabilities(node_id.clone()));
        }

        let resolved = resolve_capabilities(&node.capabilities);
        tracing::info!(
            %node_id,
            modules = resolved.modules.len(),
            non_module = resolved.non_module.len(),
            anomalies = resolved.anomalies.len(),
            "resolved capabilities"
        );

        let schema = self
            .schema_cache
            .resolve(node_id, &node.schema_cache_directory, &resolved.modules)
            .await
            .map_err(|source| MountPointError::Schema {
                node_id: node_id.clone(),
                source,
            })?;

        let mount_path = node_id.mount_path();
        let broker = DataBroker::from_pool(
            node_id.clone(),
            Arc::clone(&schema),
            &self.pool,
            Arc::clone(&self.notifier),
        )
        .await;

        let endpoint = self
            .service
            .register(MountPoint {
                node_id: node_id.clone(),
                path: mount_path.clone(),
                schema: Arc::clone(&schema),
                broker: broker.clone(),
            })
            .await?;

        let event_bus = self.event_bus.clone();
        let listener_node = node_id.clone();
        let listener = broker
            .register_change_listener(StoreKind::Configuration, move |change| {
                event_bus.publish(MountPointEvent::DataChanged {
                    node_id: listener_node.clone(),
                    store: change.kind,
                    version: change.version,
                    paths: change.paths.iter().map(ToString::to_string).collect(),
                    timestamp: Utc::now(),
                });
            });

        let registrations: Vec<Box<dyn Registration>> = vec![Box::new(endpoint), Box::new(listener)];
        let record = MountPointRecord::new(broker, node.schema_cache_directory.clone(), registrations);
        let module_count = record.schema.module_count();

        let mut records = self.records.write().await;
        if records.contains_key(node_id) {
            drop(records);
            tracing::warn!(%node_id, "cached mount point was created concurrently, discarding duplicate");
            record.release().await;
            return Ok(CreateOutcome::AlreadyActive);
        }
        records.insert(node_id.clone(), record);
        drop(records);

        tracing::info!(%node_id, %mount_path, module_count, "cached mount point created");
        self.event_bus.publish(MountPointEvent::Created {
            node_id: node_id.clone(),
            mount_path: mount_path.to_string(),
            module_count,
            timestamp: Utc::now(),
        });
        Ok(CreateOutcome::Created)
    }

    /// Tears down the mount point of `node_id`.
    ///
    /// Returns `false` if no mount point was active.
    pub async fn delete(&self, node_id: &NodeId) -> bool {
        let Some(record) = self.records.write().await.remove(node_id) else {
            tracing::debug!(%node_id, "no active cached mount point to remove");
            return false;
        };
        self.tear_down(record).await;
        true
    }

    /// Tears down every active mount point.
    pub async fn close_all(&self) {
        let records: Vec<MountPointRecord> = self.records.write().await.drain().map(|(_, r)| r).collect();
        tracing::info!(count = records.len(), "closing all cached mount points");
        for record in records {
            self.tear_down(record).await;
        }
    }

    /// Returns summaries of all active mount points ordered by node.
    pub async fn list(&self) -> Vec<MountPointSummary> {
        let records = self.records.read().await;
        let mut summaries: Vec<MountPointSummary> = records.values().map(MountPointSummary::from).collect();
        summaries.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        summaries
    }

    /// Returns the summary of one active mount point.
    pub async fn get(&self, node_id: &NodeId) -> Option<MountPointSummary> {
        self.records.read().await.get(node_id).map(MountPointSummary::from)
    }

    /// Returns the broker of one active mount point.
    pub async fn broker(&self, node_id: &NodeId) -> Option<DataBroker> {
        self.records
            .read()
            .await
            .get(node_id)
            .map(|record| record.broker.clone())
    }

    /// Returns the number of active mount points.
    pub async fn active_count(&self) -> usize {
        self.records.read().await.len()
    }

    async fn tear_down(&self, record: MountPointRecord) {
        let node_id = record.node_id.clone();
        let mount_path = record.mount_path.clone();
        let release_failures = record.release().await;
        let stores = self.pool.remove_mount(&mount_path).await;
        tracing::info!(%node_id, %mount_path, stores, release_failures, "cached mount point removed");
        self.event_bus.publish(MountPointEvent::Removed {
            node_id,
            release_failures,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::broadcast;

    use super::*;
    use crate::domain::TopologyStore;
    use crate::schema::SourceRepository;
    use crate::store::DataPath;
    use crate::tx::{DataRead, DataWrite};

    const SYSTEM_MODULE: &str = r#"module example-system {
  namespace "urn:example:system";
  prefix sys;
  revision 2024-01-01;
  container system { leaf hostname { type string; } }
}"#;

    const CAPABILITY: &str = "urn:example:system?module=example-system&revision=2024-01-01";

    fn manager(root: &Path) -> (Arc<MountPointManager>, broadcast::Receiver<MountPointEvent>) {
        let event_bus = EventBus::new(64);
        let events = event_bus.subscribe();
        let manager = MountPointManager::new(
            SchemaCache::new(root, Arc::new(SourceRepository::new())),
            Arc::new(StorePool::new()),
            Arc::new(NotificationPool::new(2, 16)),
            Arc::new(MountPointService::new()),
            event_bus,
        );
        (Arc::new(manager), events)
    }

    fn seed(root: &Path, dir: &str) {
        let dir = root.join(dir);
        if let Err(err) = std::fs::create_dir_all(&dir) {
            panic!("create dir: {err}");
        }
        if let Err(err) = std::fs::write(dir.join("example-system@2024-01-01.yang"), SYSTEM_MODULE) {
            panic!("write: {err}");
        }
    }

    fn node(id: &str, capabilities: &[&str]) -> TopologyNode {
        TopologyNode {
            node_id: NodeId::new(id),
            capabilities: capabilities.iter().map(|c| (*c).to_string()).collect(),
            schema_cache_directory: id.to_string(),
        }
    }

    async fn next_event(events: &mut broadcast::Receiver<MountPointEvent>) -> MountPointEvent {
        let Ok(Ok(event)) = tokio::time::timeout(Duration::from_secs(1), events.recv()).await else {
            panic!("no event received");
        };
        event
    }

    #[tokio::test]
    async fn second_create_is_a_no_op() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        seed(tmp.path(), "r1");
        let (manager, mut events) = manager(tmp.path());
        let r1 = node("r1", &[CAPABILITY]);

        assert!(matches!(manager.create(&r1).await, Ok(CreateOutcome::Created)));
        let MountPointEvent::Created { module_count, .. } = next_event(&mut events).await else {
            panic!("expected created event");
        };
        assert_eq!(module_count, 1);

        assert!(matches!(manager.create(&r1).await, Ok(CreateOutcome::AlreadyActive)));
        assert_eq!(manager.active_count().await, 1);
        assert_eq!(manager.service().len().await, 1);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn node_without_capabilities_fails() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let (manager, mut events) = manager(tmp.path());
        manager
            .on_topology_changed(vec![TopologyChange {
                node_id: NodeId::new("bare"),
                kind: ModificationKind::Write,
                node: Some(node("bare", &[])),
            }])
            .await;

        let MountPointEvent::Failed { reason, .. } = next_event(&mut events).await else {
            panic!("expected failed event");
        };
        assert!(reason.contains("no capabilities"));
        assert_eq!(manager.active_count().await, 0);
    }

    #[tokio::test]
    async fn unresolvable_schema_is_retried_on_next_modification() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        let (manager, mut events) = manager(tmp.path());
        let r2 = node("r2", &[CAPABILITY]);
        let write = |kind| TopologyChange {
            node_id: r2.node_id.clone(),
            kind,
            node: Some(r2.clone()),
        };

        manager.on_topology_changed(vec![write(ModificationKind::Write)]).await;
        assert!(matches!(next_event(&mut events).await, MountPointEvent::Failed { .. }));
        assert!(manager.get(&r2.node_id).await.is_none());

        seed(tmp.path(), "r2");
        manager
            .on_topology_changed(vec![write(ModificationKind::SubtreeModified)])
            .await;
        assert!(matches!(next_event(&mut events).await, MountPointEvent::Created { .. }));
        assert!(manager.get(&r2.node_id).await.is_some());
    }

    #[tokio::test]
    async fn delete_releases_everything() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        seed(tmp.path(), "r1");
        let (manager, mut events) = manager(tmp.path());
        let r1 = node("r1", &[CAPABILITY]);
        assert!(manager.create(&r1).await.is_ok());
        let _created = next_event(&mut events).await;

        assert!(manager.delete(&r1.node_id).await);
        let MountPointEvent::Removed { release_failures, .. } = next_event(&mut events).await else {
            panic!("expected removed event");
        };
        assert_eq!(release_failures, 0);
        assert!(manager.service().is_empty().await);
        assert!(manager.pool().is_empty().await);

        // absent node
        assert!(!manager.delete(&r1.node_id).await);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_broker_does_not_revive_pooled_stores() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        seed(tmp.path(), "r1");
        let (manager, mut events) = manager(tmp.path());
        let r1 = node("r1", &[CAPABILITY]);
        assert!(manager.create(&r1).await.is_ok());
        let _created = next_event(&mut events).await;
        let Some(stale) = manager.broker(&r1.node_id).await else {
            panic!("broker missing");
        };

        assert!(manager.delete(&r1.node_id).await);
        let _removed = next_event(&mut events).await;
        assert!(manager.pool().is_empty().await);

        let path = DataPath::parse("system/x");
        let mut tx = stale.new_write_only_transaction();
        tokio_test::assert_ok!(tx.put(StoreKind::Configuration, path.clone(), json!(1)).await);
        tokio_test::assert_ok!(tx.submit().await);
        assert!(manager.pool().is_empty().await);

        assert!(manager.create(&r1).await.is_ok());
        assert!(matches!(next_event(&mut events).await, MountPointEvent::Created { .. }));
        let Some(fresh) = manager.broker(&r1.node_id).await else {
            panic!("broker missing after re-create");
        };
        let reader = fresh.new_read_only_transaction();
        assert!(matches!(reader.read(StoreKind::Configuration, &path).await, Ok(None)));
    }

    #[tokio::test]
    async fn committed_config_changes_are_published() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        seed(tmp.path(), "r1");
        let (manager, mut events) = manager(tmp.path());
        let r1 = node("r1", &[CAPABILITY]);
        assert!(manager.create(&r1).await.is_ok());
        let _created = next_event(&mut events).await;

        let Some(broker) = manager.broker(&r1.node_id).await else {
            panic!("broker missing");
        };
        let mut tx = broker.new_write_only_transaction();
        tokio_test::assert_ok!(
            tx.put(
                StoreKind::Configuration,
                DataPath::parse("system/hostname"),
                json!("edge-1")
            )
            .await
        );
        tokio_test::assert_ok!(tx.submit().await);

        let MountPointEvent::DataChanged { store, paths, .. } = next_event(&mut events).await else {
            panic!("expected data change event");
        };
        assert_eq!(store, StoreKind::Configuration);
        assert_eq!(paths, vec!["/system/hostname".to_string()]);
    }

    #[tokio::test]
    async fn run_loop_follows_topology_store() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        seed(tmp.path(), "r1");
        let (manager, mut events) = manager(tmp.path());
        let (topology, changes) = TopologyStore::new(8);
        let consumer = tokio::spawn(Arc::clone(&manager).run(changes));

        topology.put_node(node("r1", &[CAPABILITY])).await;
        assert!(matches!(next_event(&mut events).await, MountPointEvent::Created { .. }));
        assert!(topology.remove_node(&NodeId::new("r1")).await);
        assert!(matches!(next_event(&mut events).await, MountPointEvent::Removed { .. }));

        drop(topology);
        assert!(consumer.await.is_ok());
    }

    #[tokio::test]
    async fn close_all_tears_every_record_down() {
        let Ok(tmp) = tempfile::tempdir() else {
            panic!("tempdir");
        };
        seed(tmp.path(), "a");
        seed(tmp.path(), "b");
        let (manager, _events) = manager(tmp.path());
        assert!(manager.create(&node("a", &[CAPABILITY])).await.is_ok());
        assert!(manager.create(&node("b", &[CAPABILITY])).await.is_ok());
        assert_eq!(manager.list().await.len(), 2);

        manager.close_all().await;
        assert_eq!(manager.active_count().await, 0);
        assert!(manager.service().is_empty().await);
    }
}
