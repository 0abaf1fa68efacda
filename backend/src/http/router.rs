//! Router configuration for the HTTP API.
//!
//! Mounts the resource table, the API root and the health check, then adds
//! middleware (timeout, compression, tracing, CORS).

use std::time::Duration;

use axum::{
    http::{Method, StatusCode},
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::handlers;
use super::registry::{self, DuplicateResource};
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(
    state: AppState,
    request_timeout: Duration,
) -> Result<Router, DuplicateResource> {
    // Read-only API: any origin, safe methods only
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers(Any);

    let api = registry::api_router(registry::RESOURCES)?;

    Ok(api
        .route("/", get(handlers::api_root))
        .route("/health", get(handlers::health_check))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state))
}
