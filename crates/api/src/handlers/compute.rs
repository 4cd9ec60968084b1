//! Handler for vector compute jobs.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::gateway::VectorJobRequest;
use crate::state::AppState;

/// POST /api/ml/compute
///
/// Runs the job to completion and answers with its outcome: 200 on
/// success, 422 when the backend rejects it, 502 when the backend call
/// fails.
pub async fn submit_vector_job(
    State(state): State<AppState>,
    payload: Result<Json<VectorJobRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    Ok(state.gateway.submit_vector(input).await)
}
