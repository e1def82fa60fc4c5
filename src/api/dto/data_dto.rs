//! Data access DTOs for mount-point store reads and writes.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::store::StoreKind;
use crate::tx::TransactionId;

/// Request path parameters of the data endpoints.
///
/// `path` is empty for the store root.
#[derive(Debug, Clone, Deserialize)]
pub struct DataPathParams {
    /// Device identifier.
    pub node_id: String,
    /// Store kind (`config` or `operational`).
    pub store: String,
    /// Slash-separated data path.
    #[serde(default)]
    pub path: String,
}

/// Arbitrary JSON document stored at a data path.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct DataPayload(pub serde_json::Value);

/// Response body for data reads.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DataResponse {
    /// Device identifier.
    pub node_id: String,
    /// Store the data was read from.
    pub store: StoreKind,
    /// Normalized data path.
    pub path: String,
    /// Stored document.
    #[schema(value_type = Object)]
    pub data: serde_json::Value,
}

/// Response body for committed writes.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommitResponse {
    /// Transaction identifier, for log correlation.
    #[schema(value_type = String)]
    pub tx_id: TransactionId,
    /// Device identifier.
    pub node_id: String,
    /// Store the write went to.
    pub store: StoreKind,
    /// Normalized data path.
    pub path: String,
    /// Applied operation (`put`, `merge` or `delete`).
    pub operation: String,
    /// Always `committed`; failures are reported as errors.
    pub status: String,
}
