//! Per-mount-point transaction factory.
//!
//! A [`DataBroker`] is the data-access endpoint published for a mount
//! point. It hands out transactions bound to the mount point's pooled
//! stores and lets callers listen to committed changes.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::{NotificationPool, ReadOnlyTransaction, ReadWriteTransaction, TransactionId, WriteOnlyTransaction};
use crate::domain::{MountPath, NodeId};
use crate::error::{ReleaseError, TransactionError};
use crate::schema::SchemaModel;
use crate::store::{DataChange, DataPath, InMemoryStore, StoreKind, StorePool};

/// State shared by a broker and every transaction it created.
///
/// The stores are resolved once when the broker is built, so a broker that
/// outlives its mount point keeps writing to the detached stores and never
/// repopulates the pool.
#[derive(Debug)]
pub(crate) struct BrokerContext {
    pub(crate) node_id: NodeId,
    pub(crate) mount_path: MountPath,
    pub(crate) schema: Arc<SchemaModel>,
    pub(crate) configuration: Arc<InMemoryStore>,
    pub(crate) operational: Arc<InMemoryStore>,
    pub(crate) notifier: Arc<NotificationPool>,
}

impl BrokerContext {
    pub(crate) const fn store(&self, kind: StoreKind) -> &Arc<InMemoryStore> {
        match kind {
            StoreKind::Configuration => &self.configuration,
            StoreKind::Operational => &self.operational,
        }
    }

    pub(crate) fn read_committed(&self, kind: StoreKind, path: &DataPath) -> Result<Option<Value>, TransactionError> {
        let store = self.store(kind);
        let path = store.canonical_path(path.clone());
        Ok(store.snapshot()?.read(&path)?)
    }
}

/// Data-access endpoint of one mount point.
///
/// Cheap to clone; all clones share the same stores.
#[derive(Debug, Clone)]
pub struct DataBroker {
    context: Arc<BrokerContext>,
}

impl DataBroker {
    /// Creates a broker for `node_id` over its configuration and
    /// operational stores.
    #[must_use]
    pub fn new(
        node_id: NodeId,
        schema: Arc<SchemaModel>,
        configuration: Arc<InMemoryStore>,
        operational: Arc<InMemoryStore>,
        notifier: Arc<NotificationPool>,
    ) -> Self {
        let mount_path = node_id.mount_path();
        Self {
            context: Arc::new(BrokerContext {
                node_id,
                mount_path,
                schema,
                configuration,
                operational,
                notifier,
            }),
        }
    }

    /// Creates a broker over the pooled stores of `node_id`'s mount path,
    /// building them if needed.
    pub async fn from_pool(
        node_id: NodeId,
        schema: Arc<SchemaModel>,
        pool: &StorePool,
        notifier: Arc<NotificationPool>,
    ) -> Self {
        let mount_path = node_id.mount_path();
        let configuration = pool
            .get_or_create(&mount_path, &schema, StoreKind::Configuration)
            .await;
        let operational = pool
            .get_or_create(&mount_path, &schema, StoreKind::Operational)
            .await;
        Self::new(node_id, schema, configuration, operational, notifier)
    }

    /// Returns the node this broker serves.
    #[must_use]
    pub fn node_id(&self) -> &NodeId {
        &self.context.node_id
    }

    /// Returns the mount path this broker serves.
    #[must_use]
    pub fn mount_path(&self) -> &MountPath {
        &self.context.mount_path
    }

    /// Returns the schema the broker's stores validate against.
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaModel> {
        &self.context.schema
    }

    /// Opens a read-only transaction.
    #[must_use]
    pub fn new_read_only_transaction(&self) -> ReadOnlyTransaction {
        let id = TransactionId::new();
        tracing::debug!(tx_id = %id, node_id = %self.context.node_id, "read-only transaction opened");
        ReadOnlyTransaction::new(id, Arc::clone(&self.context))
    }

    /// Opens a write-only transaction.
    #[must_use]
    pub fn new_write_only_transaction(&self) -> WriteOnlyTransaction {
        let id = TransactionId::new();
        tracing::debug!(tx_id = %id, node_id = %self.context.node_id, "write-only transaction opened");
        WriteOnlyTransaction::new(id, Arc::clone(&self.context))
    }

    /// Opens a read-write transaction.
    #[must_use]
    pub fn new_read_write_transaction(&self) -> ReadWriteTransaction {
        let id = TransactionId::new();
        tracing::debug!(tx_id = %id, node_id = %self.context.node_id, "read-write transaction opened");
        ReadWriteTransaction::new(id, &self.context)
    }

    /// Calls `listener` for every change committed to the `kind` store.
    ///
    /// The listener runs on its own task until the returned registration
    /// is closed or the store is dropped.
    pub fn register_change_listener<F>(&self, kind: StoreKind, mut listener: F) -> ListenerRegistration
    where
        F: FnMut(DataChange) + Send + 'static,
    {
        let store = self.context.store(kind);
        let mut changes = store.subscribe();
        let name = format!("{}-listener", store.name());

        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => listener(change),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(listener = %task_name, skipped, "change listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        tracing::debug!(listener = %name, "change listener registered");
        ListenerRegistration { name, handle }
    }
}

/// Handle of a change listener; closing it stops the listener.
pub struct ListenerRegistration {
    name: String,
    handle: JoinHandle<()>,
}

impl ListenerRegistration {
    /// Returns the registration name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the listener.
    ///
    /// # Errors
    ///
    /// Returns [`ReleaseError::ListenerTerminated`] if the listener task had
    /// already ended abnormally (e.g. the listener panicked).
    pub async fn close(self) -> Result<(), ReleaseError> {
        if self.handle.is_finished() {
            return self
                .handle
                .await
                .map_err(|err| ReleaseError::ListenerTerminated {
                    name: self.name,
                    reason: err.to_string(),
                });
        }
        self.handle.abort();
        tracing::debug!(listener = %self.name, "change listener closed");
        Ok(())
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("name", &self.name)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}
