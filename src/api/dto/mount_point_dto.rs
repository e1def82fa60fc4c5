//! Mount-point DTOs for list and detail responses.

use serde::Serialize;
use utoipa::ToSchema;

use crate::mount::MountPointSummary;

/// List response for `GET /mount-points`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MountPointListResponse {
    /// Active mount points ordered by node.
    pub data: Vec<MountPointSummary>,
    /// Number of active mount points.
    pub total: usize,
}
