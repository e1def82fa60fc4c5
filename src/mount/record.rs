//! Active mount-point record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Registration, release_all};
use crate::domain::{MountPath, NodeId};
use crate::schema::SchemaModel;
use crate::tx::DataBroker;

/// Everything owned by one active mount point.
///
/// Created once per [`NodeId`] when its topology node appears; released as
/// a whole when the node is removed.
#[derive(Debug)]
pub struct MountPointRecord {
    /// Device identifier.
    pub node_id: NodeId,
    /// Published mount path.
    pub mount_path: MountPath,
    /// Schema cache subdirectory the schema was resolved from.
    pub cache_directory: String,
    /// Resolved schema.
    pub schema: Arc<SchemaModel>,
    /// Transaction factory of the mount point.
    pub broker: DataBroker,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    registrations: Vec<Box<dyn Registration>>,
}

impl MountPointRecord {
    /// Creates a record owning `registrations`.
    #[must_use]
    pub fn new(
        broker: DataBroker,
        cache_directory: String,
        registrations: Vec<Box<dyn Registration>>,
    ) -> Self {
        Self {
            node_id: broker.node_id().clone(),
            mount_path: broker.mount_path().clone(),
            schema: Arc::clone(broker.schema()),
            broker,
            cache_directory,
            created_at: Utc::now(),
            registrations,
        }
    }

    /// Returns the number of held registrations.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.registrations.len()
    }

    /// Releases every registration. Returns the number of failed releases.
    pub async fn release(self) -> usize {
        release_all(self.registrations).await
    }
}

/// Compiled module as shown by the mount-point endpoints.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct ModuleSummary {
    /// Module name.
    pub name: String,
    /// Module revision.
    pub revision: Option<String>,
    /// Module namespace.
    pub namespace: String,
}

/// Lightweight view of an active mount point.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct MountPointSummary {
    /// Device identifier.
    #[schema(value_type = String)]
    pub node_id: NodeId,
    /// Published mount path.
    #[schema(value_type = String)]
    pub mount_path: MountPath,
    /// Schema cache subdirectory.
    pub cache_directory: String,
    /// Compiled modules, imports included.
    pub modules: Vec<ModuleSummary>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&MountPointRecord> for MountPointSummary {
    fn from(record: &MountPointRecord) -> Self {
        Self {
            node_id: record.node_id.clone(),
            mount_path: record.mount_path.clone(),
            cache_directory: record.cache_directory.clone(),
            modules: record
                .schema
                .modules()
                .map(|module| ModuleSummary {
                    name: module.name.clone(),
                    revision: module.revision.clone(),
                    namespace: module.namespace.clone(),
                })
                .collect(),
            created_at: record.created_at,
        }
    }
}
