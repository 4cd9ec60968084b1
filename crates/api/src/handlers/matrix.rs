//! Handler for matrix compute jobs.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::error::AppResult;
use crate::gateway::MatrixJobRequest;
use crate::state::AppState;

/// POST /api/matrix/compute
///
/// Invalid requests (missing operand, unknown operation, mismatched
/// dimensions) are rejected with 400 before anything is broadcast.
pub async fn submit_matrix_job(
    State(state): State<AppState>,
    payload: Result<Json<MatrixJobRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = payload?;
    let outcome = state.gateway.submit_matrix(input).await.map_err(|e| {
        tracing::warn!(error = %e, "Rejected matrix compute request");
        e
    })?;
    Ok(outcome)
}
