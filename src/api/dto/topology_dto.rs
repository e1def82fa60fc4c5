//! Topology DTOs for node configuration.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{NodeId, TopologyNode};

/// Request body for `PUT /topology/nodes/{node_id}`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PutTopologyNodeRequest {
    /// Capability strings advertised by the device.
    pub capabilities: Vec<String>,
    /// Schema cache subdirectory. Defaults to the node identifier.
    #[serde(default)]
    pub schema_cache_directory: Option<String>,
}

impl PutTopologyNodeRequest {
    /// Builds the topology node for `node_id`.
    #[must_use]
    pub fn into_node(self, node_id: NodeId) -> TopologyNode {
        let schema_cache_directory = self
            .schema_cache_directory
            .filter(|dir| !dir.is_empty())
            .unwrap_or_else(|| node_id.to_string());
        TopologyNode {
            node_id,
            capabilities: self.capabilities,
            schema_cache_directory,
        }
    }
}

/// Topology node as returned by the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopologyNodeDto {
    /// Device identifier.
    pub node_id: String,
    /// Capability strings advertised by the device.
    pub capabilities: Vec<String>,
    /// Schema cache subdirectory.
    pub schema_cache_directory: String,
    /// Whether a mount point is currently active for the node.
    pub mounted: bool,
}

/// List response for `GET /topology/nodes`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TopologyNodeListResponse {
    /// Configured nodes ordered by identifier.
    pub data: Vec<TopologyNodeDto>,
    /// Number of configured nodes.
    pub total: usize,
}
