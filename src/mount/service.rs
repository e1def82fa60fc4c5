//! Registry of published mount points.
//!
//! [`MountPointService`] is where consumers discover a device's data
//! endpoint: it maps each [`MountPath`] to the [`MountPoint`] serving it.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::RwLock;

use super::Registration;
use crate::domain::{MountPath, NodeId};
use crate::error::{MountPointError, ReleaseError};
use crate::schema::SchemaModel;
use crate::tx::DataBroker;

/// Data-access endpoint published for one device.
#[derive(Debug, Clone)]
pub struct MountPoint {
    /// Device the endpoint serves.
    pub node_id: NodeId,
    /// Path the endpoint is published under.
    pub path: MountPath,
    /// Schema of the device.
    pub schema: Arc<SchemaModel>,
    /// Transaction factory.
    pub broker: DataBroker,
}

/// Registry of published mount points.
#[derive(Debug, Default)]
pub struct MountPointService {
    points: RwLock<HashMap<MountPath, Arc<MountPoint>>>,
}

impl MountPointService {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a mount point.
    ///
    /// # Errors
    ///
    /// Returns [`MountPointError::AlreadyRegistered`] if another mount point
    /// is published under the same path.
    pub async fn register(
        self: &Arc<Self>,
        point: MountPoint,
    ) -> Result<MountPointRegistration, MountPointError> {
        let path = point.path.clone();
        let mut points = self.points.write().await;
        if points.contains_key(&path) {
            return Err(MountPointError::AlreadyRegistered(path.to_string()));
        }
        points.insert(path.clone(), Arc::new(point));
        drop(points);

        tracing::info!(mount_path = %path, "mount point registered");
        Ok(MountPointRegistration {
            name: path.to_string(),
            path,
            service: Arc::clone(self),
        })
    }

    /// Returns the mount point published under `path`.
    pub async fn get(&self, path: &MountPath) -> Option<Arc<MountPoint>> {
        self.points.read().await.get(path).map(Arc::clone)
    }

    /// Returns the number of published mount points.
    pub async fn len(&self) -> usize {
        self.points.read().await.len()
    }

    /// Returns `true` if nothing is published.
    pub async fn is_empty(&self) -> bool {
        self.points.read().await.is_empty()
    }

    async fn unregister(&self, path: &MountPath) -> Result<(), ReleaseError> {
        if self.points.write().await.remove(path).is_none() {
            return Err(ReleaseError::NotRegistered(path.to_string()));
        }
        tracing::info!(mount_path = %path, "mount point unregistered");
        Ok(())
    }
}

/// Handle of a published mount point; closing it unpublishes it.
#[derive(Debug)]
pub struct MountPointRegistration {
    name: String,
    path: MountPath,
    service: Arc<MountPointService>,
}

impl MountPointRegistration {
    /// Returns the published path.
    #[must_use]
    pub fn path(&self) -> &MountPath {
        &self.path
    }
}

impl Registration for MountPointRegistration {
    fn name(&self) -> &str {
        &self.name
    }

    fn close(self: Box<Self>) -> BoxFuture<'static, Result<(), ReleaseError>> {
        Box::pin(async move { self.service.unregister(&self.path).await })
    }
}
