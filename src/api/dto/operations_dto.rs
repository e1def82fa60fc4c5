//! DTOs for administrative operations.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::schema::LoadModelsOutcome;

/// Request body for `POST /operations/load-models`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoadModelsRequest {
    /// Cache subdirectory to create under the schema cache root.
    pub schema_cache_directory: String,
    /// File or directory to copy schema sources from.
    pub source_path: String,
}

/// Response body for `POST /operations/load-models`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoadModelsResponse {
    /// `created`, `already_exists` or `error`.
    pub status: String,
    /// Failure message, present for `error`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl From<&LoadModelsOutcome> for LoadModelsResponse {
    fn from(outcome: &LoadModelsOutcome) -> Self {
        match outcome {
            LoadModelsOutcome::Created => Self {
                status: "created".to_string(),
                message: None,
            },
            LoadModelsOutcome::AlreadyExists => Self {
                status: "already_exists".to_string(),
                message: None,
            },
            LoadModelsOutcome::Error(message) => Self {
                status: "error".to_string(),
                message: Some(message.clone()),
            },
        }
    }
}
