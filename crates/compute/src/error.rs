/// Failures surfaced by the compute backend client.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The backend could not be reached at startup. Fatal, never retried.
    #[error("Failed to connect to compute backend at {address}: {reason}")]
    Connection { address: String, reason: String },

    /// The RPC itself failed (non-OK gRPC status, deadline, broken channel,
    /// or client shutdown).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered but rejected or failed the job.
    #[error("Backend reported status '{status}': {message}")]
    BackendReported { status: String, message: String },
}

impl From<tonic::Status> for ComputeError {
    fn from(status: tonic::Status) -> Self {
        ComputeError::Transport(format!("{}: {}", status.code(), status.message()))
    }
}
