//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`, `GET /api/health` - Health check: counter store, audit queue
//! - everything else                   - JSON 404 (storefront handlers mount here)
//!
//! # Middleware
//!
//! - **Tracing** - Structured request/response logging
//! - **Shield** - IP filter, rate limits, security headers, CORS, body limit and input
//!   hygiene, applied to every route including the fallback
//! - **Path normalization** - Trailing slash handling

use crate::api;
use crate::api::handlers::not_found_handler;
use crate::api::middleware::{Shield, protect, tracing};
use crate::state::AppState;
use axum::Router;
use std::sync::Arc;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Constructs the application router.
///
/// `storefront` carries the business routes to protect; they share the shield with
/// the service's own endpoints.
pub fn app_router(
    state: AppState,
    shield: Arc<Shield>,
    storefront: Router,
) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(shielded_router(state, shield, storefront))
}

/// The routed and shielded service, before path normalization.
pub fn shielded_router(state: AppState, shield: Arc<Shield>, storefront: Router) -> Router {
    let router = api::routes::service_routes()
        .with_state(state)
        .merge(storefront)
        .fallback(not_found_handler);

    protect(router, shield).layer(tracing::layer())
}
