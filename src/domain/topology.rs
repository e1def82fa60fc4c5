//! Topology input: device nodes and their change notifications.
//!
//! [`TopologyStore`] stands in for the external configuration store. It
//! keeps the configured [`TopologyNode`]s and publishes every mutation as a
//! batch of [`TopologyChange`]s over a bounded channel consumed by the
//! mount-point manager.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};

use super::NodeId;

/// Configuration of one device in the cached mount-point topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyNode {
    /// Device identifier (topology node key).
    pub node_id: NodeId,
    /// Capability strings advertised by the device.
    pub capabilities: Vec<String>,
    /// Name of the per-device schema cache subdirectory.
    pub schema_cache_directory: String,
}

/// Kind of modification applied to a topology node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationKind {
    /// The node was written (created or replaced).
    Write,
    /// A part of an existing node changed.
    SubtreeModified,
    /// The node was removed.
    Delete,
}

impl ModificationKind {
    /// Returns the serialized name of the modification.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::SubtreeModified => "subtree_modified",
            Self::Delete => "delete",
        }
    }
}

/// A single change notification for one topology node.
#[derive(Debug, Clone)]
pub struct TopologyChange {
    /// Affected node.
    pub node_id: NodeId,
    /// What happened to it.
    pub kind: ModificationKind,
    /// Node contents after the change; `None` for deletions.
    pub node: Option<TopologyNode>,
}

/// In-process configuration store for topology nodes.
///
/// Mutations are applied to the node map and then published, in order, to
/// the single consumer holding the receiver returned by [`TopologyStore::new`].
#[derive(Debug)]
pub struct TopologyStore {
    nodes: RwLock<BTreeMap<NodeId, TopologyNode>>,
    changes: mpsc::Sender<Vec<TopologyChange>>,
}

impl TopologyStore {
    /// Creates an empty store and the receiving end of its change feed.
    #[must_use]
    pub fn new(channel_capacity: usize) -> (Self, mpsc::Receiver<Vec<TopologyChange>>) {
        let (changes, rx) = mpsc::channel(channel_capacity.max(1));
        let store = Self {
            nodes: RwLock::new(BTreeMap::new()),
            changes,
        };
        (store, rx)
    }

    /// Writes a node, publishing `Write` for new nodes and `SubtreeModified`
    /// for existing ones.
    ///
    /// Returns the modification kind that was published.
    pub async fn put_node(&self, node: TopologyNode) -> ModificationKind {
        let kind = {
            let mut nodes = self.nodes.write().await;
            let previous = nodes.insert(node.node_id.clone(), node.clone());
            if previous.is_some() {
                ModificationKind::SubtreeModified
            } else {
                ModificationKind::Write
            }
        };
        self.publish(vec![TopologyChange {
            node_id: node.node_id.clone(),
            kind,
            node: Some(node),
        }])
        .await;
        kind
    }

    /// Removes a node, publishing `Delete` if it existed.
    ///
    /// Returns `true` if the node was present.
    pub async fn remove_node(&self, node_id: &NodeId) -> bool {
        let removed = self.nodes.write().await.remove(node_id).is_some();
        if removed {
            self.publish(vec![TopologyChange {
                node_id: node_id.clone(),
                kind: ModificationKind::Delete,
                node: None,
            }])
            .await;
        }
        removed
    }

    /// Returns a copy of one configured node.
    pub async fn node(&self, node_id: &NodeId) -> Option<TopologyNode> {
        self.nodes.read().await.get(node_id).cloned()
    }

    /// Returns all configured nodes ordered by identifier.
    pub async fn nodes(&self) -> Vec<TopologyNode> {
        self.nodes.read().await.values().cloned().collect()
    }

    async fn publish(&self, batch: Vec<TopologyChange>) {
        if self.changes.send(batch).await.is_err() {
            tracing::warn!("topology change consumer is gone, dropping notification");
        }
    }
}
