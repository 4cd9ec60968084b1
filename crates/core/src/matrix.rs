//! Row-major matrix buffer and the fixed set of matrix operations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

/// A row-major 2-D buffer of `f32` values with explicit dimensions.
///
/// The buffer is independent of any wire encoding. `data.len()` is expected
/// to equal `rows * cols`; [`Matrix::validate`] enforces it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: u32,
    pub cols: u32,
    #[serde(default)]
    pub data: Vec<f32>,
}

impl Matrix {
    pub fn new(rows: u32, cols: u32, data: Vec<f32>) -> Self {
        Self { rows, cols, data }
    }

    /// Number of elements implied by the declared dimensions, if it fits.
    pub fn expected_len(&self) -> Option<usize> {
        (self.rows as usize).checked_mul(self.cols as usize)
    }

    /// Reject matrices whose data length does not match `rows * cols`.
    ///
    /// Mismatched buffers are never truncated or padded.
    pub fn validate(&self) -> Result<(), CoreError> {
        match self.expected_len() {
            Some(expected) if expected == self.data.len() => Ok(()),
            _ => Err(CoreError::Validation(format!(
                "Matrix {}x{} requires {} values, got {}",
                self.rows,
                self.cols,
                self.expected_len()
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "an unrepresentable number of".to_string()),
                self.data.len()
            ))),
        }
    }

    /// Value at `(row, col)`, or `None` when outside the stored data.
    pub fn get(&self, row: u32, col: u32) -> Option<f32> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let index = row as usize * self.cols as usize + col as usize;
        self.data.get(index).copied()
    }
}

/// Pretty printer. Index access is clamped to the stored data, so a short
/// buffer prints partial rows instead of panicking.
impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Matrix {}x{}:", self.rows, self.cols)?;
        for row in 0..self.rows {
            f.write_str("[")?;
            let values: Vec<String> = (0..self.cols)
                .filter_map(|col| self.get(row, col))
                .map(|v| format!("{v:8.4}"))
                .collect();
            f.write_str(&values.join(", "))?;
            f.write_str("]\n")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Operations supported by the compute backend for matrix jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatrixOperation {
    Multiply,
    Add,
    Subtract,
    Transpose,
    Inverse,
}

/// Every known operation, in wire-name order.
pub const MATRIX_OPERATIONS: &[MatrixOperation] = &[
    MatrixOperation::Multiply,
    MatrixOperation::Add,
    MatrixOperation::Subtract,
    MatrixOperation::Transpose,
    MatrixOperation::Inverse,
];

impl MatrixOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            MatrixOperation::Multiply => "multiply",
            MatrixOperation::Add => "add",
            MatrixOperation::Subtract => "subtract",
            MatrixOperation::Transpose => "transpose",
            MatrixOperation::Inverse => "inverse",
        }
    }

    /// Binary operations need both `matrixA` and `matrixB`.
    pub fn requires_second_operand(self) -> bool {
        matches!(
            self,
            MatrixOperation::Multiply | MatrixOperation::Add | MatrixOperation::Subtract
        )
    }
}

impl fmt::Display for MatrixOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatrixOperation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MATRIX_OPERATIONS
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = MATRIX_OPERATIONS.iter().map(|op| op.as_str()).collect();
                CoreError::Validation(format!(
                    "Invalid matrix operation '{s}'. Must be one of: {}",
                    names.join(", ")
                ))
            })
    }
}
