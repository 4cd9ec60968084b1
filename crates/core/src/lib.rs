//! Domain model for the ML Hybrid gateway.
//!
//! Holds the types shared by every other crate in the workspace: the
//! per-job [`Task`](task::Task) lifecycle, the row-major
//! [`Matrix`](matrix::Matrix) buffer, the [`TaskEvent`](event::TaskEvent)
//! broadcast envelope, and the common [`CoreError`](error::CoreError).

pub mod error;
pub mod event;
pub mod matrix;
pub mod task;
pub mod types;
