//! Topology handlers: list, put and delete device nodes.
//!
//! Writes go to the [`crate::domain::TopologyStore`]; the lifecycle manager
//! picks the resulting change up asynchronously, hence `202 Accepted`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, put};
use axum::{Json, Router};

use crate::api::dto::{
    AcceptedResponse, PutTopologyNodeRequest, TopologyNodeDto, TopologyNodeListResponse,
};
use crate::app_state::AppState;
use crate::domain::{ModificationKind, NodeId};
use crate::error::{ApiError, ErrorResponse};

/// `GET /topology/nodes`: List configured topology nodes.
///
/// # Errors
///
/// Never fails; the signature matches the other handlers.
#[utoipa::path(
    get,
    path = "/api/v1/topology/nodes",
    tag = "Topology",
    summary = "List topology nodes",
    description = "Returns every configured cached mount-point node and whether its mount point is active.",
    responses(
        (status = 200, description = "Configured nodes", body = TopologyNodeListResponse),
    )
)]
pub async fn list_nodes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let nodes = state.topology.nodes().await;
    let mut data = Vec::with_capacity(nodes.len());
    for node in nodes {
        let mounted = state.manager.get(&node.node_id).await.is_some();
        data.push(TopologyNodeDto {
            node_id: node.node_id.to_string(),
            capabilities: node.capabilities,
            schema_cache_directory: node.schema_cache_directory,
            mounted,
        });
    }
    let total = data.len();
    Ok(Json(TopologyNodeListResponse { data, total }))
}

/// `PUT /topology/nodes/{node_id}`: Create or modify a topology node.
///
/// # Errors
///
/// Returns [`ApiError::InvalidRequest`] for a blank node identifier.
#[utoipa::path(
    put,
    path = "/api/v1/topology/nodes/{node_id}",
    tag = "Topology",
    summary = "Put a topology node",
    description = "Writes the node into the topology store. A new node is published as `write`, an existing one as `subtree_modified`; the mount point is created asynchronously.",
    params(
        ("node_id" = String, Path, description = "Device identifier"),
    ),
    request_body = PutTopologyNodeRequest,
    responses(
        (status = 202, description = "Change accepted", body = AcceptedResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    )
)]
pub async fn put_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
    Json(req): Json<PutTopologyNodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if node_id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("node_id must not be blank".to_string()));
    }
    let node = req.into_node(NodeId::new(&node_id));
    let kind = state.topology.put_node(node).await;
    tracing::debug!(%node_id, kind = kind.as_str(), "topology node accepted");

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            node_id,
            modification: kind.as_str().to_string(),
        }),
    ))
}

/// `DELETE /topology/nodes/{node_id}`: Delete a topology node.
///
/// # Errors
///
/// Returns [`ApiError::TopologyNodeNotFound`] if the node is not configured.
#[utoipa::path(
    delete,
    path = "/api/v1/topology/nodes/{node_id}",
    tag = "Topology",
    summary = "Delete a topology node",
    description = "Removes the node from the topology store; its mount point is torn down asynchronously.",
    params(
        ("node_id" = String, Path, description = "Device identifier"),
    ),
    responses(
        (status = 202, description = "Deletion accepted", body = AcceptedResponse),
        (status = 404, description = "Node not configured", body = ErrorResponse),
    )
)]
pub async fn delete_node(
    State(state): State<AppState>,
    Path(node_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.topology.remove_node(&NodeId::new(&node_id)).await {
        return Err(ApiError::TopologyNodeNotFound(node_id));
    }
    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse {
            node_id,
            modification: ModificationKind::Delete.as_str().to_string(),
        }),
    ))
}

/// Topology routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/topology/nodes", get(list_nodes))
        .route("/topology/nodes/{node_id}", put(put_node).delete(delete_node))
}
