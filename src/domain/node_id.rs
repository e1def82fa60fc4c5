//! Type-safe device identity and mount path.
//!
//! [`NodeId`] is a newtype over the topology node key so device identifiers
//! cannot be confused with other strings. [`MountPath`] is the structured
//! path under which a device's mount point is published.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Name of the topology that holds cached mount-point nodes.
pub const TOPOLOGY_NAME: &str = "cached-mount-point";

/// Unique identifier of a managed device in the topology.
///
/// Cheap to clone (reference counted). Used as the key of the active
/// mount-point set, as the event discriminator, and as the WebSocket
/// subscription target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Creates a `NodeId` from any string-like value.
    #[must_use]
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the structured path of this node's mount point.
    #[must_use]
    pub fn mount_path(&self) -> MountPath {
        MountPath::for_node(self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

/// Structured path of a mount point:
/// `/network-topology/topology/cached-mount-point/node/<node-id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MountPath(Arc<str>);

impl MountPath {
    /// Builds the mount path for a topology node.
    #[must_use]
    pub fn for_node(node_id: &NodeId) -> Self {
        Self(Arc::from(format!(
            "/network-topology/topology/{TOPOLOGY_NAME}/node/{node_id}"
        )))
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
