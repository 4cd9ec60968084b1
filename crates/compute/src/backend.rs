//! Backend-facing trait and the domain results it returns.

use async_trait::async_trait;
use mlhybrid_core::matrix::{Matrix, MatrixOperation};

use crate::error::ComputeError;

/// Status string the backend uses for a successful job.
pub const STATUS_COMPLETED: &str = "completed";

/// Result of a successful vector compute call.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorComputeOutcome {
    pub result: Vec<f32>,
    pub task_id: String,
    pub status: String,
    pub execution_time_ms: i64,
}

/// A validated matrix job ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixJob {
    pub task_id: String,
    pub operation: MatrixOperation,
    pub matrix_a: Matrix,
    pub matrix_b: Option<Matrix>,
}

/// Result of a matrix compute call that reached the backend.
///
/// A backend-side failure is still an outcome: `status` is not
/// `completed` and `error_message` explains why.
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixComputeOutcome {
    pub result: Option<Matrix>,
    pub task_id: String,
    pub status: String,
    pub error_message: Option<String>,
    pub execution_time_ms: i64,
}

impl MatrixComputeOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }
}

/// Backend readiness as reported by its status RPC.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendStatus {
    pub ready: bool,
    pub gpu_info: String,
    pub current_load: f32,
    pub error: Option<String>,
}

/// Calls the gateway makes against the compute backend.
///
/// Implementations must be safe to call concurrently from many requests.
#[async_trait]
pub trait ComputeBackend: Send + Sync {
    /// Element-wise vector compute. A non-`completed` status is returned as
    /// [`ComputeError::BackendReported`]; `task_type` defaults to
    /// `"default"`.
    async fn vector_compute(
        &self,
        values: Vec<f32>,
        task_id: &str,
        task_type: Option<&str>,
    ) -> Result<VectorComputeOutcome, ComputeError>;

    /// Matrix compute. Only RPC failures are errors.
    async fn matrix_compute(&self, job: MatrixJob) -> Result<MatrixComputeOutcome, ComputeError>;

    /// Backend readiness probe.
    async fn status(&self, client_id: &str) -> Result<BackendStatus, ComputeError>;
}
