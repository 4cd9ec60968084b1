//! Lifecycle event envelope pushed to WebSocket subscribers.
//!
//! Constructed via one of the status constructors ([`TaskEvent::started`],
//! [`TaskEvent::completed`], [`TaskEvent::failed`], [`TaskEvent::error`]) and
//! enriched with the `with_*` builder methods. Optional fields are omitted
//! from the JSON when unset.

use serde::{Deserialize, Serialize};

use crate::matrix::{Matrix, MatrixOperation};
use crate::task::TaskStatus;
use crate::types::now_millis;

/// A job lifecycle event, serialized as a camelCase JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskEvent {
    pub task_id: String,

    pub status: TaskStatus,

    /// Job-specific payload: input values on start, results on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<MatrixOperation>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cols: Option<u32>,

    /// Milliseconds since the Unix epoch, stamped at construction.
    pub timestamp: i64,
}

impl TaskEvent {
    fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            data: None,
            error: None,
            operation: None,
            execution_time_ms: None,
            rows: None,
            cols: None,
            timestamp: now_millis(),
        }
    }

    pub fn started(task_id: impl Into<String>) -> Self {
        Self::new(task_id, TaskStatus::Started)
    }

    pub fn completed(task_id: impl Into<String>) -> Self {
        Self::new(task_id, TaskStatus::Completed)
    }

    pub fn failed(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(task_id, TaskStatus::Failed).with_error(error)
    }

    pub fn error(task_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(task_id, TaskStatus::Error).with_error(error)
    }

    /// Attach a JSON payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_operation(mut self, operation: MatrixOperation) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn with_execution_time(mut self, execution_time_ms: i64) -> Self {
        self.execution_time_ms = Some(execution_time_ms);
        self
    }

    /// Record the dimensions of a result matrix.
    pub fn with_dimensions(mut self, matrix: &Matrix) -> Self {
        self.rows = Some(matrix.rows);
        self.cols = Some(matrix.cols);
        self
    }
}
