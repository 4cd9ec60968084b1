use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use mlhybrid_compute::client::GATEWAY_CLIENT_ID;
use serde::Serialize;

use crate::state::AppState;

/// Response body for the health check endpoint.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` when the server is reachable.
    pub status: String,
    /// Crate version from `Cargo.toml`.
    pub version: String,
    /// Whether the compute backend answered its status probe as ready.
    pub backend_healthy: bool,
    /// Number of connected WebSocket subscribers.
    pub subscribers: usize,
}

/// GET /health -- returns service health including backend reachability.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let backend_healthy = match state.backend.status(GATEWAY_CLIENT_ID).await {
        Ok(status) => status.ready,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: backend status probe failed");
            false
        }
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend_healthy,
        subscribers: state.hub.subscriber_count().await,
    })
}

/// Health check router (mounted at root level, not under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
