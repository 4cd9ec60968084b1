//! Job orchestration between HTTP handlers, the compute backend and the
//! broadcast hub.
//!
//! Every accepted job follows the same path: assign an id, broadcast
//! `started`, await the backend, broadcast exactly one terminal event
//! (`completed`, `failed` or `error`), then hand the outcome back to the
//! handler. Validation failures are returned before any broadcast.

use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::FutureExt;
use mlhybrid_compute::{ComputeBackend, ComputeError, MatrixComputeOutcome, MatrixJob};
use mlhybrid_core::error::CoreError;
use mlhybrid_core::event::TaskEvent;
use mlhybrid_core::matrix::{Matrix, MatrixOperation};
use mlhybrid_core::types::TaskId;
use mlhybrid_core::task::{
    assign_matrix_task_id, assign_task_id, Task, TaskKind, TaskStatus,
};
use mlhybrid_events::BroadcastHub;
use serde::{Deserialize, Serialize};
use serde_json::json;

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

/// Body of `POST /api/ml/compute`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorJobRequest {
    #[serde(default)]
    pub data: Vec<f32>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
}

/// Body of `POST /api/matrix/compute`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixJobRequest {
    #[serde(default)]
    pub matrix_a: Option<Matrix>,
    #[serde(default)]
    pub matrix_b: Option<Matrix>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub operation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorJobResponse {
    pub result: Vec<f32>,
    pub task_id: TaskId,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixJobResponse {
    pub result_matrix: Matrix,
    pub task_id: TaskId,
    pub status: String,
    pub execution_time_ms: i64,
}

/// Body returned when a job reached the backend but did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub error: String,
    pub task_id: TaskId,
    pub status: String,
}

/// How a dispatched job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome<T> {
    /// The backend completed the job.
    Completed(T),
    /// The backend answered but reported a failure.
    Failed(JobFailure),
    /// The backend call itself failed.
    Errored(JobFailure),
}

impl<T> JobOutcome<T> {
    pub fn status_code(&self) -> StatusCode {
        match self {
            JobOutcome::Completed(_) => StatusCode::OK,
            JobOutcome::Failed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            JobOutcome::Errored(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl<T: Serialize> IntoResponse for JobOutcome<T> {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            JobOutcome::Completed(body) => (status, Json(body)).into_response(),
            JobOutcome::Failed(body) | JobOutcome::Errored(body) => {
                (status, Json(body)).into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TaskGateway
// ---------------------------------------------------------------------------

/// Runs compute jobs against the backend and publishes their lifecycle.
pub struct TaskGateway {
    hub: Arc<BroadcastHub>,
    backend: Arc<dyn ComputeBackend>,
}

impl TaskGateway {
    pub fn new(hub: Arc<BroadcastHub>, backend: Arc<dyn ComputeBackend>) -> Self {
        Self { hub, backend }
    }

    /// Run a vector job. Vector jobs have no validation beyond defaulting,
    /// so every request is dispatched.
    pub async fn submit_vector(&self, request: VectorJobRequest) -> JobOutcome<VectorJobResponse> {
        let VectorJobRequest {
            data,
            task_id,
            task_type,
        } = request;

        let mut task = Task::start(assign_task_id(task_id), TaskKind::vector(task_type));
        let task_type = task.kind().operation().to_string();

        tracing::info!(
            task_id = %task.id(),
            task_type = %task_type,
            data_points = data.len(),
            "Received vector compute job",
        );
        self.hub
            .broadcast(&TaskEvent::started(task.id()).with_data(json!(data)))
            .await;

        let call = self
            .backend
            .vector_compute(data, task.id(), Some(task_type.as_str()));
        let result = guard_backend_call(call).await;

        match result {
            Ok(outcome) => {
                advance(&mut task, |t| t.complete(Some(outcome.execution_time_ms)));
                self.hub
                    .broadcast(&TaskEvent::completed(task.id()).with_data(json!(outcome.result)))
                    .await;
                tracing::info!(
                    task_id = %task.id(),
                    results = outcome.result.len(),
                    "Vector compute job completed",
                );

                JobOutcome::Completed(VectorJobResponse {
                    result: outcome.result,
                    task_id: task.id().to_string(),
                    status: outcome.status,
                })
            }
            Err(ComputeError::BackendReported { status, message }) => {
                advance(&mut task, |t| t.fail(message.clone(), None));
                self.hub
                    .broadcast(&TaskEvent::failed(task.id(), message.clone()))
                    .await;
                tracing::warn!(
                    task_id = %task.id(),
                    backend_status = %status,
                    error = %message,
                    "Vector compute job rejected by backend",
                );

                JobOutcome::Failed(JobFailure {
                    error: message,
                    task_id: task.id().to_string(),
                    status: task.status().to_string(),
                })
            }
            Err(e) => {
                let message = e.to_string();
                advance(&mut task, |t| t.error(message.clone()));
                self.hub
                    .broadcast(&TaskEvent::error(task.id(), message.clone()))
                    .await;
                tracing::error!(task_id = %task.id(), error = %message, "Error processing computation");

                JobOutcome::Errored(JobFailure {
                    status: format!("error: {message}"),
                    error: message,
                    task_id: task.id().to_string(),
                })
            }
        }
    }

    /// Validate and run a matrix job.
    ///
    /// Returns `Err` only for invalid requests, in which case nothing was
    /// broadcast and the backend was not called.
    pub async fn submit_matrix(
        &self,
        request: MatrixJobRequest,
    ) -> Result<JobOutcome<MatrixJobResponse>, CoreError> {
        let task_id = assign_matrix_task_id(request.task_id.clone());
        let job = validate_matrix_request(task_id, request)?;

        let mut task = Task::start(
            job.task_id.clone(),
            TaskKind::Matrix {
                operation: job.operation,
            },
        );
        let operation = job.operation;

        tracing::info!(
            task_id = %task.id(),
            operation = %operation,
            rows = job.matrix_a.rows,
            cols = job.matrix_a.cols,
            "Received matrix compute job",
        );
        self.hub
            .broadcast(&TaskEvent::started(task.id()).with_operation(operation))
            .await;

        let result = guard_backend_call(self.backend.matrix_compute(job)).await;

        let outcome = match result {
            Ok(MatrixComputeOutcome {
                result: Some(matrix),
                status,
                execution_time_ms,
                ..
            }) if status == mlhybrid_compute::STATUS_COMPLETED => {
                advance(&mut task, |t| t.complete(Some(execution_time_ms)));
                self.hub
                    .broadcast(
                        &TaskEvent::completed(task.id())
                            .with_operation(operation)
                            .with_execution_time(execution_time_ms)
                            .with_dimensions(&matrix),
                    )
                    .await;
                tracing::info!(
                    task_id = %task.id(),
                    execution_time_ms,
                    rows = matrix.rows,
                    cols = matrix.cols,
                    "Matrix compute job completed",
                );

                JobOutcome::Completed(MatrixJobResponse {
                    result_matrix: matrix,
                    task_id: task.id().to_string(),
                    status,
                    execution_time_ms,
                })
            }
            Ok(outcome) => {
                // A completed status without a result matrix is still a failure.
                let (message, status) = if outcome.is_completed() {
                    (
                        outcome
                            .error_message
                            .unwrap_or_else(|| "Backend returned no result matrix".to_string()),
                        TaskStatus::Failed.to_string(),
                    )
                } else {
                    (
                        outcome
                            .error_message
                            .unwrap_or_else(|| format!("Matrix {operation} failed")),
                        outcome.status,
                    )
                };

                advance(&mut task, |t| t.fail(message.clone(), Some(outcome.execution_time_ms)));
                self.hub
                    .broadcast(
                        &TaskEvent::failed(task.id(), message.clone())
                            .with_operation(operation)
                            .with_execution_time(outcome.execution_time_ms),
                    )
                    .await;
                tracing::warn!(
                    task_id = %task.id(),
                    backend_status = %status,
                    error = %message,
                    "Matrix compute job failed in backend",
                );

                JobOutcome::Failed(JobFailure {
                    error: message,
                    task_id: task.id().to_string(),
                    status,
                })
            }
            Err(e) => {
                let message = e.to_string();
                advance(&mut task, |t| t.error(message.clone()));
                self.hub
                    .broadcast(
                        &TaskEvent::error(task.id(), message.clone()).with_operation(operation),
                    )
                    .await;
                tracing::error!(
                    task_id = %task.id(),
                    error = %message,
                    "Error processing matrix computation",
                );

                JobOutcome::Errored(JobFailure {
                    error: format!("Error processing matrix computation: {message}"),
                    task_id: task.id().to_string(),
                    status: format!("error: {message}"),
                })
            }
        };

        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Check operands and the operation name, producing a job ready for
/// dispatch.
fn validate_matrix_request(
    task_id: TaskId,
    request: MatrixJobRequest,
) -> Result<MatrixJob, CoreError> {
    let operation = MatrixOperation::from_str(request.operation.trim())?;

    let matrix_a = request
        .matrix_a
        .ok_or_else(|| CoreError::Validation("Matrix A is required".to_string()))?;
    matrix_a.validate()?;

    if operation.requires_second_operand() && request.matrix_b.is_none() {
        return Err(CoreError::Validation(format!(
            "Matrix B is required for {operation} operation"
        )));
    }
    if let Some(matrix_b) = &request.matrix_b {
        matrix_b.validate()?;
    }

    Ok(MatrixJob {
        task_id,
        operation,
        matrix_a,
        matrix_b: request.matrix_b,
    })
}

/// Await a backend call, turning a panic inside the backend into a
/// transport failure so the job still gets its terminal event.
async fn guard_backend_call<F, T>(call: F) -> Result<T, ComputeError>
where
    F: std::future::Future<Output = Result<T, ComputeError>>,
{
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!("Compute backend call panicked");
            Err(ComputeError::Transport(
                "compute backend call panicked".to_string(),
            ))
        }
    }
}

/// Apply a lifecycle transition, logging a rejected one. Each task is
/// driven through a single transition, so rejection means a bug.
fn advance<F>(task: &mut Task, transition: F)
where
    F: FnOnce(&mut Task) -> Result<(), CoreError>,
{
    if let Err(e) = transition(task) {
        tracing::error!(task_id = %task.id(), error = %e, "Task lifecycle violation");
    }
}
