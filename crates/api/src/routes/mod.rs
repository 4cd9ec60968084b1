pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Route tree for everything under `/api`.
///
/// ```text
/// POST /ml/compute        vector compute job
/// GET  /ml/status         liveness text
/// GET  /ml/info           system description
/// POST /matrix/compute    matrix compute job
/// GET  /status            service status
/// GET  /backend-status    compute backend status probe
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ml/compute", post(handlers::compute::submit_vector_job))
        .route("/ml/status", get(handlers::probes::ml_status))
        .route("/ml/info", get(handlers::probes::ml_info))
        .route("/matrix/compute", post(handlers::matrix::submit_matrix_job))
        .route("/status", get(handlers::probes::service_status))
        .route("/backend-status", get(handlers::probes::backend_status))
}

/// WebSocket upgrade endpoint for lifecycle subscribers.
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws::ws_handler))
}
