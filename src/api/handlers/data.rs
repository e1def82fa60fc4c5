//! Data handlers: read and write a mount point's stores.
//!
//! Every request runs in its own transaction obtained from the mount
//! point's [`DataBroker`]. Writes are submitted immediately and answered
//! once the three-phase commit has finished.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CommitResponse, DataPathParams, DataPayload, DataResponse};
use crate::app_state::AppState;
use crate::domain::NodeId;
use crate::error::{ApiError, ErrorResponse};
use crate::store::{DataPath, StoreKind};
use crate::tx::{DataBroker, DataRead, DataWrite};

/// Looks up the broker and parses the store kind and data path.
async fn target(
    state: &AppState,
    params: DataPathParams,
) -> Result<(DataBroker, StoreKind, DataPath), ApiError> {
    let kind: StoreKind = params
        .store
        .parse()
        .map_err(|err: crate::store::UnknownStoreKind| ApiError::InvalidStoreKind(err.0))?;
    let broker = state
        .manager
        .broker(&NodeId::new(&params.node_id))
        .await
        .ok_or(ApiError::MountPointNotFound(params.node_id))?;
    Ok((broker, kind, DataPath::parse(&params.path)))
}

/// `GET /mount-points/{node_id}/data/{store}/{path}`: Read data.
///
/// # Errors
///
/// Returns [`ApiError::DataNotFound`] if nothing is stored at the path,
/// [`ApiError::MountPointNotFound`] for an inactive node, or
/// [`ApiError::InvalidStoreKind`] for an unknown store.
#[utoipa::path(
    get,
    path = "/api/v1/mount-points/{node_id}/data/{store}/{path}",
    tag = "Data",
    summary = "Read data",
    description = "Reads the committed document at `path` in the `config` or `operational` store. The route without a path reads the whole store.",
    params(
        ("node_id" = String, Path, description = "Device identifier"),
        ("store" = String, Path, description = "`config` or `operational`"),
        ("path" = String, Path, description = "Slash-separated data path"),
    ),
    responses(
        (status = 200, description = "Stored document", body = DataResponse),
        (status = 400, description = "Invalid store kind", body = ErrorResponse),
        (status = 404, description = "Mount point or data not found", body = ErrorResponse),
    )
)]
pub async fn read_data(
    State(state): State<AppState>,
    Path(params): Path<DataPathParams>,
) -> Result<impl IntoResponse, ApiError> {
    let (broker, kind, path) = target(&state, params).await?;
    let tx = broker.new_read_only_transaction();
    let result = tx.read(kind, &path).await;
    tx.close();

    let data = result?.ok_or_else(|| ApiError::DataNotFound(path.to_string()))?;
    Ok(Json(DataResponse {
        node_id: broker.node_id().to_string(),
        store: kind,
        path: path.to_string(),
        data,
    }))
}

/// Staged modification requested over HTTP.
#[derive(Debug)]
enum WriteOp {
    Put(serde_json::Value),
    Merge(serde_json::Value),
    Delete,
}

impl WriteOp {
    const fn name(&self) -> &'static str {
        match self {
            Self::Put(_) => "put",
            Self::Merge(_) => "merge",
            Self::Delete => "delete",
        }
    }
}

/// Stages `op` in a fresh write-only transaction and submits it.
async fn commit(state: &AppState, params: DataPathParams, op: WriteOp) -> Result<CommitResponse, ApiError> {
    let (broker, kind, path) = target(state, params).await?;
    let operation = op.name();
    let mut tx = broker.new_write_only_transaction();
    let tx_id = tx.id();

    match op {
        WriteOp::Put(value) => tx.put(kind, path.clone(), value).await?,
        WriteOp::Merge(value) => tx.merge(kind, path.clone(), value).await?,
        WriteOp::Delete => tx.delete(kind, path.clone()).await?,
    }
    tx.submit().await?;

    tracing::debug!(%tx_id, node_id = %broker.node_id(), store = %kind, %path, operation, "write committed");
    Ok(CommitResponse {
        tx_id,
        node_id: broker.node_id().to_string(),
        store: kind,
        path: path.to_string(),
        operation: operation.to_string(),
        status: "committed".to_string(),
    })
}

/// `PUT /mount-points/{node_id}/data/{store}/{path}`: Replace data.
///
/// # Errors
///
/// Returns [`ApiError::Transaction`] if staging or the commit fails, plus
/// the lookup errors of [`read_data`].
#[utoipa::path(
    put,
    path = "/api/v1/mount-points/{node_id}/data/{store}/{path}",
    tag = "Data",
    summary = "Replace data",
    description = "Replaces the document at `path` and commits it through the three-phase commit.",
    params(
        ("node_id" = String, Path, description = "Device identifier"),
        ("store" = String, Path, description = "`config` or `operational`"),
        ("path" = String, Path, description = "Slash-separated data path"),
    ),
    request_body = DataPayload,
    responses(
        (status = 200, description = "Committed", body = CommitResponse),
        (status = 400, description = "Invalid store kind or path", body = ErrorResponse),
        (status = 404, description = "Mount point not found", body = ErrorResponse),
        (status = 409, description = "Commit phase failed", body = ErrorResponse),
        (status = 422, description = "Schema validation failed", body = ErrorResponse),
    )
)]
pub async fn put_data(
    State(state): State<AppState>,
    Path(params): Path<DataPathParams>,
    Json(payload): Json<DataPayload>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(commit(&state, params, WriteOp::Put(payload.0)).await?))
}

/// `PATCH /mount-points/{node_id}/data/{store}/{path}`: Merge data.
///
/// # Errors
///
/// Same as [`put_data`].
#[utoipa::path(
    patch,
    path = "/api/v1/mount-points/{node_id}/data/{store}/{path}",
    tag = "Data",
    summary = "Merge data",
    description = "Deep-merges the document into `path` and commits it.",
    params(
        ("node_id" = String, Path, description = "Device identifier"),
        ("store" = String, Path, description = "`config` or `operational`"),
        ("path" = String, Path, description = "Slash-separated data path"),
    ),
    request_body = DataPayload,
    responses(
        (status = 200, description = "Committed", body = CommitResponse),
        (status = 400, description = "Invalid store kind or path", body = ErrorResponse),
        (status = 404, description = "Mount point not found", body = ErrorResponse),
        (status = 409, description = "Commit phase failed", body = ErrorResponse),
        (status = 422, description = "Schema validation failed", body = ErrorResponse),
    )
)]
pub async fn merge_data(
    State(state): State<AppState>,
    Path(params): Path<DataPathParams>,
    Json(payload): Json<DataPayload>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(commit(&state, params, WriteOp::Merge(payload.0)).await?))
}

/// `DELETE /mount-points/{node_id}/data/{store}/{path}`: Delete data.
///
/// # Errors
///
/// Same as [`put_data`].
#[utoipa::path(
    delete,
    path = "/api/v1/mount-points/{node_id}/data/{store}/{path}",
    tag = "Data",
    summary = "Delete data",
    description = "Removes the document at `path` and commits the removal.",
    params(
        ("node_id" = String, Path, description = "Device identifier"),
        ("store" = String, Path, description = "`config` or `operational`"),
        ("path" = String, Path, description = "Slash-separated data path"),
    ),
    responses(
        (status = 200, description = "Committed", body = CommitResponse),
        (status = 400, description = "Invalid store kind or path", body = ErrorResponse),
        (status = 404, description = "Mount point not found", body = ErrorResponse),
        (status = 409, description = "Commit phase failed", body = ErrorResponse),
    )
)]
pub async fn delete_data(
    State(state): State<AppState>,
    Path(params): Path<DataPathParams>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(commit(&state, params, WriteOp::Delete).await?))
}

/// Data routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/mount-points/{node_id}/data/{store}", get(read_data))
        .route(
            "/mount-points/{node_id}/data/{store}/{*path}",
            get(read_data).put(put_data).patch(merge_data).delete(delete_data),
        )
}
