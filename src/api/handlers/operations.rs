//! Administrative operations.

use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{LoadModelsRequest, LoadModelsResponse};
use crate::app_state::AppState;
use crate::error::{ApiError, ErrorResponse};
use crate::schema::{LoadModelsOutcome, load_models};

/// `POST /operations/load-models`: Pre-seed a schema cache directory.
///
/// # Errors
///
/// Never returns `Err`; a failed copy is answered with `400` and an
/// `error` status body.
#[utoipa::path(
    post,
    path = "/api/v1/operations/load-models",
    tag = "Operations",
    summary = "Load schema models",
    description = "Copies a schema file, or every file of a directory, into a new subdirectory of the schema cache root. An existing subdirectory is left untouched.",
    request_body = LoadModelsRequest,
    responses(
        (status = 201, description = "Directory created and populated", body = LoadModelsResponse),
        (status = 200, description = "Directory already exists", body = LoadModelsResponse),
        (status = 400, description = "Copy failed", body = LoadModelsResponse),
        (status = 422, description = "Malformed request body", body = ErrorResponse),
    )
)]
pub async fn load_models_handler(
    State(state): State<AppState>,
    Json(req): Json<LoadModelsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = load_models(
        &state.schema_cache_root,
        &req.schema_cache_directory,
        &PathBuf::from(&req.source_path),
    )
    .await;

    let status = match &outcome {
        LoadModelsOutcome::Created => StatusCode::CREATED,
        LoadModelsOutcome::AlreadyExists => StatusCode::OK,
        LoadModelsOutcome::Error(message) => {
            tracing::error!(directory = %req.schema_cache_directory, %message, "load-models failed");
            StatusCode::BAD_REQUEST
        }
    };
    Ok((status, Json(LoadModelsResponse::from(&outcome))))
}

/// Operation routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/operations/load-models", post(load_models_handler))
}
