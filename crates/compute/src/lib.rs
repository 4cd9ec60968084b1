//! Client side of the external compute backend.
//!
//! - [`ComputeBackend`] is the seam the gateway calls through, so tests can
//!   substitute an in-process stub.
//! - [`ComputeClient`] is the production implementation: one tonic channel
//!   to the backend's `ml.ML` gRPC service ([`messages`]), with an explicit
//!   [`connect`](ComputeClient::connect) and a bounded
//!   [`shutdown`](ComputeClient::shutdown).

pub mod backend;
pub mod client;
pub mod error;
pub mod messages;

pub use backend::{
    BackendStatus, ComputeBackend, MatrixComputeOutcome, MatrixJob, VectorComputeOutcome,
    STATUS_COMPLETED,
};
pub use client::{ComputeClient, ComputeOptions, ShutdownOutcome};
pub use error::ComputeError;
