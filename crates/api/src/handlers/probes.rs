//! Read-only status and info probes. None of these broadcast.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use mlhybrid_compute::client::GATEWAY_CLIENT_ID;
use serde::Serialize;

use crate::error::AppResult;
use crate::state::AppState;

const SERVICE_NAME: &str = "ML Hybrid System - Gateway";

/// Response body for `GET /api/status`.
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub timestamp: i64,
}

/// Response body for `GET /api/backend-status`.
#[derive(Debug, Serialize)]
pub struct BackendStatusResponse {
    pub connected: bool,
    pub address: String,
    pub ready: bool,
    pub gpu_info: Option<String>,
    pub current_load: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /api/status
pub async fn service_status() -> Json<ServiceStatus> {
    tracing::debug!("Status endpoint called");
    Json(ServiceStatus {
        status: "running",
        service: SERVICE_NAME,
        timestamp: mlhybrid_core::types::now_millis(),
    })
}

/// GET /api/backend-status
///
/// Asks the backend for its status. An unreachable backend is reported in
/// the body, not as an HTTP error.
pub async fn backend_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let address = format!(
        "{}:{}",
        state.config.compute_host, state.config.compute_port
    );

    let body = match state.backend.status(GATEWAY_CLIENT_ID).await {
        Ok(status) => BackendStatusResponse {
            connected: true,
            address,
            ready: status.ready,
            gpu_info: Some(status.gpu_info),
            current_load: Some(status.current_load),
            error: status.error,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Backend status probe failed");
            BackendStatusResponse {
                connected: false,
                address,
                ready: false,
                gpu_info: None,
                current_load: None,
                error: Some(e.to_string()),
            }
        }
    };

    Ok(Json(body))
}

/// GET /api/ml/status
pub async fn ml_status() -> &'static str {
    "ML Hybrid System is running"
}

/// GET /api/ml/info
pub async fn ml_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "system": "ML Hybrid Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Distributed computing system for machine learning",
        "components": {
            "gateway": "Axum REST API + WebSocket",
            "backend": "GPU-accelerated computing service",
            "communication": "gRPC",
        },
    }))
}
