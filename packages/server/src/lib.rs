pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod ingest;
pub mod models;
pub mod profiles;
pub mod routes;
pub mod state;
pub mod utils;

use axum::http::HeaderValue;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable as ScalarServable};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CorsConfig;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PrintVault API",
        version = "1.0.0",
        description = "Multi-tenant 3D-model file library: models, immutable versions, and \
            print profiles extracted from slicer project files"
    ),
    tags(
        (name = "Models", description = "Model lifecycle"),
        (name = "Versions", description = "Version ingestion and metadata"),
        (name = "Print Profiles", description = "Slicer profile extraction and conflicts"),
        (name = "Files", description = "Single-file access"),
        (name = "Organizations", description = "Tenant usage reporting"),
        (name = "Uploads", description = "Programmatic upload surface"),
    ),
)]
struct ApiDoc;

/// Build the application router.
pub fn build_router(state: AppState) -> axum::Router {
    let cors = cors_layer(&state.config.server.cors);

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api", routes::api_routes())
        .split_for_parts();

    router
        .layer(cors)
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api.clone()))
        .merge(Scalar::with_url("/scalar", api))
}

fn cors_layer(cfg: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .max_age(std::time::Duration::from_secs(cfg.max_age));

    if cfg.allow_origins.is_empty() {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = cfg
            .allow_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}
