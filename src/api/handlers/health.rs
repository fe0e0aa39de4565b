//! Handler for health check endpoint.

use axum::{Json, extract::State, http::StatusCode};

use crate::api::dto::health::{CheckStatus, HealthChecks, HealthResponse};
use crate::state::AppState;

/// Returns service health status with component checks.
///
/// # Endpoint
///
/// `GET /health` and `GET /api/health`. Both are outside the `general` limiter scope.
///
/// # Response Codes
///
/// - **200 OK**: All components healthy
/// - **503 Service Unavailable**: One or more components degraded
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "checks": {
///     "counter_store": { "status": "ok", "backend": "redis", "message": "reachable" },
///     "audit_queue": { "status": "ok", "message": "Free slots: 10000" }
///   }
/// }
/// ```
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<HealthResponse>)> {
    let store_check = check_counter_store(&state).await;
    let queue_check = check_audit_queue(&state);

    let all_healthy = store_check.is_ok() && queue_check.is_ok();

    let response = HealthResponse {
        status: if all_healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        checks: HealthChecks {
            counter_store: store_check,
            audit_queue: queue_check,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

async fn check_counter_store(state: &AppState) -> CheckStatus {
    let backend = state.counter_store.backend();
    let check = if state.counter_store.health_check().await {
        CheckStatus::ok("reachable")
    } else {
        tracing::warn!(backend, "Counter store health check failed");
        CheckStatus::error("unreachable")
    };
    check.with_backend(backend)
}

fn check_audit_queue(state: &AppState) -> CheckStatus {
    if state.audit.is_closed() {
        CheckStatus::error("Audit worker stopped")
    } else {
        CheckStatus::ok(format!("Free slots: {}", state.audit.capacity()))
    }
}
