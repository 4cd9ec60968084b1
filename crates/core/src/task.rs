//! Per-job lifecycle model.
//!
//! A [`Task`] is created by the gateway once a request has passed
//! validation, starts in [`TaskStatus::Started`], and moves exactly once to
//! a terminal status. It lives for the duration of one request and is never
//! shared or persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::matrix::MatrixOperation;
use crate::types::TaskId;

/// Task type sent to the backend when a vector job does not name one.
pub const DEFAULT_TASK_TYPE: &str = "default";

/// Prefix for generated matrix job identifiers.
pub const MATRIX_TASK_ID_PREFIX: &str = "matrix-";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status broadcast to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Started,
    Completed,
    Failed,
    Error,
}

impl TaskStatus {
    /// Wire name of the status (`"started"`, `"completed"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Started => "started",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Error => "error",
        }
    }

    /// Whether no further transition is allowed from this status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Started)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// The two supported job shapes and their operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Element-wise vector compute with a free-form task type.
    Vector { task_type: String },
    /// Matrix compute with one of the fixed operations.
    Matrix { operation: MatrixOperation },
}

impl TaskKind {
    /// Build a vector kind, falling back to [`DEFAULT_TASK_TYPE`].
    pub fn vector(task_type: Option<String>) -> Self {
        let task_type = task_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TASK_TYPE.to_string());
        TaskKind::Vector { task_type }
    }

    /// Operation name as sent to the backend.
    pub fn operation(&self) -> &str {
        match self {
            TaskKind::Vector { task_type } => task_type,
            TaskKind::Matrix { operation } => operation.as_str(),
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// One compute job, owned by the gateway for the duration of one request.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    kind: TaskKind,
    status: TaskStatus,
    error_message: Option<String>,
    execution_time_ms: Option<i64>,
}

impl Task {
    /// Create a task in the `started` status.
    pub fn start(id: TaskId, kind: TaskKind) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Started,
            error_message: None,
            execution_time_ms: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn execution_time_ms(&self) -> Option<i64> {
        self.execution_time_ms
    }

    /// Mark the task completed with the backend-reported duration.
    pub fn complete(&mut self, execution_time_ms: Option<i64>) -> Result<(), CoreError> {
        self.transition(TaskStatus::Completed)?;
        self.execution_time_ms = execution_time_ms;
        Ok(())
    }

    /// Mark the task failed with the backend's own error message.
    pub fn fail(
        &mut self,
        message: impl Into<String>,
        execution_time_ms: Option<i64>,
    ) -> Result<(), CoreError> {
        self.transition(TaskStatus::Failed)?;
        self.error_message = Some(message.into());
        self.execution_time_ms = execution_time_ms;
        Ok(())
    }

    /// Mark the task errored after a transport failure. No duration is kept.
    pub fn error(&mut self, message: impl Into<String>) -> Result<(), CoreError> {
        self.transition(TaskStatus::Error)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), CoreError> {
        if self.status.is_terminal() || !to.is_terminal() {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Identifier assignment
// ---------------------------------------------------------------------------

/// Generate a fresh, collision-resistant job identifier (random UUID v4).
pub fn generate_task_id() -> TaskId {
    uuid::Uuid::new_v4().to_string()
}

/// Keep a non-empty client-supplied id, otherwise generate one.
pub fn assign_task_id(supplied: Option<String>) -> TaskId {
    supplied
        .filter(|id| !id.is_empty())
        .unwrap_or_else(generate_task_id)
}

/// Same as [`assign_task_id`] but generated ids carry the `matrix-` prefix.
pub fn assign_matrix_task_id(supplied: Option<String>) -> TaskId {
    supplied
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| format!("{MATRIX_TASK_ID_PREFIX}{}", generate_task_id()))
}
