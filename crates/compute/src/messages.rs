//! Generated gRPC bindings for the `ml.ML` compute service (`proto/ml.proto`).
//!
//! Proto3 scalars default to their zero values, so an absent `error_message`
//! or `error` arrives as an empty string.

#![allow(clippy::all)]

tonic::include_proto!("ml");

/// Clamp to the wire's `int32` range.
fn dimension_to_wire(n: u32) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Negative dimensions are nonsense from the wire; read them as empty.
fn dimension_from_wire(n: i32) -> u32 {
    u32::try_from(n).unwrap_or(0)
}

impl From<mlhybrid_core::matrix::Matrix> for Matrix {
    fn from(m: mlhybrid_core::matrix::Matrix) -> Self {
        Self {
            rows: dimension_to_wire(m.rows),
            cols: dimension_to_wire(m.cols),
            data: m.data,
        }
    }
}

impl From<Matrix> for mlhybrid_core::matrix::Matrix {
    fn from(m: Matrix) -> Self {
        mlhybrid_core::matrix::Matrix::new(
            dimension_from_wire(m.rows),
            dimension_from_wire(m.cols),
            m.data,
        )
    }
}
