//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Resource endpoints are mounted under `/api/v1`; `/health` and `/ws` sit
//! at the root.

pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// OpenAPI document of the REST surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "mount-cache",
        description = "Cached mount points backed by a two-tier schema cache and pooled in-memory stores."
    ),
    paths(
        handlers::system::health_handler,
        handlers::topology::list_nodes,
        handlers::topology::put_node,
        handlers::topology::delete_node,
        handlers::mount_point::list_mount_points,
        handlers::mount_point::get_mount_point,
        handlers::data::read_data,
        handlers::data::put_data,
        handlers::data::merge_data,
        handlers::data::delete_data,
        handlers::operations::load_models_handler,
    ),
    components(schemas(
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
        handlers::system::HealthResponse,
        dto::AcceptedResponse,
        dto::PutTopologyNodeRequest,
        dto::TopologyNodeDto,
        dto::TopologyNodeListResponse,
        dto::MountPointListResponse,
        crate::mount::MountPointSummary,
        crate::mount::ModuleSummary,
        dto::DataPayload,
        dto::DataResponse,
        dto::CommitResponse,
        dto::LoadModelsRequest,
        dto::LoadModelsResponse,
        crate::store::StoreKind,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Topology", description = "Cached mount-point topology configuration"),
        (name = "Mount Points", description = "Active mount points"),
        (name = "Data", description = "Transactional access to mount-point stores"),
        (name = "Operations", description = "Administrative operations"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

/// Builds the full application: REST routes, the `/ws` endpoint and the
/// tracing, CORS and timeout layers, bound to `state`.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
