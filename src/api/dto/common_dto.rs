//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Acknowledgement for requests that are applied asynchronously.
///
/// Returned with `202 Accepted`: the topology store recorded the change and
/// the lifecycle manager will act on it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AcceptedResponse {
    /// Node the request targeted.
    pub node_id: String,
    /// Modification that was published (`write`, `subtree_modified` or
    /// `delete`).
    pub modification: String,
}
