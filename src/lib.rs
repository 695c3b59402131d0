// ==============================================================================
// lib.rs - Annotation Report Gateway Library
// ==============================================================================
// Description: Router and module wiring for the report gateway
// Author: Matt Barham
// Created: 2026-10-19
// Modified: 2026-10-19
// Version: 1.0.0
// ==============================================================================

pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod pipeline;
pub mod publish;
pub mod state;
pub mod uploads;
pub mod validator;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use config::Config;
use state::AppState;

pub fn build_router(state: AppState, config: &Config) -> Router {
    let templates = ServeDir::new(state.static_dir().join("templates"));

    let router = Router::new()
        // Upload form
        .route("/", get(handlers::index))
        // Upload + pipeline run
        .route("/upload", post(handlers::upload))
        // Published reports
        .route("/results/{filename}", get(handlers::download_result))
        // Health checks
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        // Metadata template linked from the form
        .nest_service("/templates", templates)
        .layer(
            ServiceBuilder::new()
                // Request tracing
                .layer(TraceLayer::new_for_http())
                // Request body size limit
                .layer(DefaultBodyLimit::max(config.max_upload_bytes())),
        )
        .with_state(state);

    // The page is same-origin; CORS only matters for external callers
    let origins: Vec<HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    if origins.is_empty() {
        return router;
    }

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(false)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE]);

    router.layer(cors)
}
