use std::sync::Arc;
use std::time::SystemTime;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Server start time for uptime reporting.
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME.elapsed().map(|d| d.as_secs()).unwrap_or(0)
}

/// Liveness: 200 while the process runs.
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "suppsearch-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
    }))
}

/// Readiness: store reachable and the discovery backlog visible.
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> ServerResult<impl IntoResponse> {
    let backlog = state
        .service
        .queue()
        .pending_count()
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok(Json(json!({
        "status": "ready",
        "service": "suppsearch-server",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": uptime_seconds(),
        "components": {
            "store": { "rows": state.service.store().len() },
            "discovery": { "backlog": backlog },
        }
    })))
}

/// API landing document.
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "service": "suppsearch-server",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": [
            "POST /api/v1/search",
            "POST /api/v1/supplements",
            "GET /api/v1/supplements/{name}",
            "GET /api/v1/discovery/jobs/{id}",
            "GET /health",
            "GET /ready",
            "GET /metrics",
        ],
    }))
}

/// Fallback handler.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
