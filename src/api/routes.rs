//! Endpoints owned by the service.

use crate::api::handlers::health_handler;
use crate::state::AppState;
use axum::{Router, routing::get};

/// Health endpoints, exempt from the `general` limiter.
///
/// # Endpoints
///
/// - `GET /health`
/// - `GET /api/health`
pub fn service_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
}
