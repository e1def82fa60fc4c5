//! Mount-point handlers: list and detail of active mount points.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::MountPointListResponse;
use crate::app_state::AppState;
use crate::domain::NodeId;
use crate::error::{ApiError, ErrorResponse};
use crate::mount::MountPointSummary;

/// `GET /mount-points`: List active mount points.
///
/// # Errors
///
/// Never fails; the signature matches the other handlers.
#[utoipa::path(
    get,
    path = "/api/v1/mount-points",
    tag = "Mount Points",
    summary = "List mount points",
    description = "Returns every active cached mount point ordered by node identifier.",
    responses(
        (status = 200, description = "Active mount points", body = MountPointListResponse),
    )
)]
pub async fn list_mount_points(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let data = state.manager.list().await;
    let total = data.len();
    Ok(Json(MountPointListResponse { data, total }))
}

/// `GET /mount-points/{node_id}`: Mount-point details.
///
/// # Errors
///
/// Returns [`ApiError::MountPointNotFound`] if no mount point is active for
/// the node.
#[utoipa::path(
    get,
    path = "/api/v1/mount-points/{node_id}",
    tag = "Mount Points",
    summary = "Get mount point details",
    description = "Returns the mount path, cache directory and compiled modules of one active mount point.",
    params(
        ("node_id" = String, Path, description = "Device identifier"),
    ),
    responses(
        (status = 200, description = "Mount point details", body = MountPointSummary),
        (status = 404, description = "Mount point not found", body = ErrorResponse),
    )
)]
pub async fn get_mount_point(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .manager
        .get(&NodeId::new(&node_id))
        .await
        .ok_or(ApiError::MountPointNotFound(node_id))?;
    Ok(Json(summary))
}

/// Mount-point routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/mount-points", get(list_mount_points))
        .route("/mount-points/{node_id}", get(get_mount_point))
}
