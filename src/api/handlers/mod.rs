//! REST endpoint handlers organized by resource.

pub mod data;
pub mod mount_point;
pub mod operations;
pub mod system;
pub mod topology;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(topology::routes())
        .merge(mount_point::routes())
        .merge(data::routes())
        .merge(operations::routes())
}
