//! gRPC client for the compute backend.
//!
//! [`ComputeClient`] owns one tonic [`Channel`] shared by every request. Each
//! call clones the generated stub, which is cheap and multiplexes over the
//! same HTTP/2 connection without any caller-side locking. Call
//! [`ComputeClient::connect`] once at startup and
//! [`ComputeClient::shutdown`] once at teardown.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mlhybrid_core::task::DEFAULT_TASK_TYPE;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};

use crate::backend::{
    BackendStatus, ComputeBackend, MatrixComputeOutcome, MatrixJob, VectorComputeOutcome,
    STATUS_COMPLETED,
};
use crate::error::ComputeError;
use crate::messages::ml_client::MlClient;
use crate::messages::{ComputeRequest, MatrixComputeRequest, StatusRequest};

/// Client id sent with the startup status probe.
pub const GATEWAY_CLIENT_ID: &str = "mlhybrid-gateway";

/// Tunables for [`ComputeClient`].
#[derive(Debug, Clone, Default)]
pub struct ComputeOptions {
    /// Per-call deadline. `None` waits for the backend indefinitely.
    pub rpc_timeout: Option<Duration>,
}

/// How [`ComputeClient::shutdown`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight call finished before the deadline.
    Graceful,
    /// The deadline passed; the remaining calls were aborted.
    Forced { abandoned: usize },
    /// Shutdown had already been requested earlier.
    AlreadyShutDown,
}

/// Compute backend client over one shared gRPC channel.
#[derive(Debug)]
pub struct ComputeClient {
    stub: MlClient<Channel>,
    in_flight: AtomicUsize,
    idle: Notify,
    closed: AtomicBool,
    /// Cancelled when shutdown gives up waiting; aborts in-flight calls.
    cancel: CancellationToken,
}

/// Decrements the in-flight counter when a call ends, however it ends.
struct InFlightGuard<'a> {
    client: &'a ComputeClient,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.client.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.client.idle.notify_waiters();
        }
    }
}

/// Render an error with its whole source chain; tonic's transport errors
/// keep the useful part (e.g. "Connection refused") in the sources.
fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut text = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

impl ComputeClient {
    /// Open the channel to `http://{host}:{port}` and verify the backend
    /// answers its status probe.
    ///
    /// Failure is fatal to startup and is not retried here.
    pub async fn connect(
        host: &str,
        port: u16,
        options: ComputeOptions,
    ) -> Result<Self, ComputeError> {
        let address = format!("http://{host}:{port}");
        tracing::info!(%address, "Initializing compute backend client");

        let connection_error = |reason: String| ComputeError::Connection {
            address: address.clone(),
            reason,
        };

        let mut endpoint =
            Endpoint::from_shared(address.clone()).map_err(|e| connection_error(describe(&e)))?;
        if let Some(timeout) = options.rpc_timeout {
            endpoint = endpoint.timeout(timeout);
        }
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| connection_error(describe(&e)))?;

        let client = Self {
            stub: MlClient::new(channel),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        };

        let status = client
            .status(GATEWAY_CLIENT_ID)
            .await
            .map_err(|e| connection_error(e.to_string()))?;

        tracing::info!(
            %address,
            ready = status.ready,
            gpu_info = %status.gpu_info,
            "Compute backend client connected",
        );
        Ok(client)
    }

    /// Number of calls currently waiting on the backend.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop admitting calls, wait up to `timeout` for in-flight calls to
    /// finish, then abort whatever is left.
    ///
    /// Only the first call does anything; later calls return
    /// [`ShutdownOutcome::AlreadyShutDown`].
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownOutcome {
        if self.closed.swap(true, Ordering::SeqCst) {
            tracing::warn!("Compute client shutdown requested twice");
            return ShutdownOutcome::AlreadyShutDown;
        }

        tracing::info!(
            in_flight = self.in_flight(),
            timeout_ms = timeout.as_millis() as u64,
            "Shutting down compute client",
        );

        if tokio::time::timeout(timeout, self.wait_idle()).await.is_ok() {
            tracing::info!("Compute client shut down cleanly");
            return ShutdownOutcome::Graceful;
        }

        let abandoned = self.in_flight();
        self.cancel.cancel();
        tracing::warn!(abandoned, "Compute client shutdown deadline passed, aborting calls");
        ShutdownOutcome::Forced { abandoned }
    }

    // ---- private helpers ----

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    fn admit(&self) -> Result<InFlightGuard<'_>, ComputeError> {
        let shut_down = || ComputeError::Transport("compute client is shut down".to_string());

        if self.closed.load(Ordering::SeqCst) {
            return Err(shut_down());
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = InFlightGuard { client: self };

        // Shutdown may have started between the check and the increment.
        if self.closed.load(Ordering::SeqCst) {
            return Err(shut_down());
        }
        Ok(guard)
    }

    /// Run one unary RPC on a clone of the shared stub.
    async fn call<T, F, Fut>(&self, rpc: F) -> Result<T, ComputeError>
    where
        F: FnOnce(MlClient<Channel>) -> Fut,
        Fut: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        let _guard = self.admit()?;

        tokio::select! {
            _ = self.cancel.cancelled() => Err(ComputeError::Transport(
                "call aborted by compute client shutdown".to_string(),
            )),
            result = rpc(self.stub.clone()) => {
                result.map(tonic::Response::into_inner).map_err(ComputeError::from)
            }
        }
    }
}

#[async_trait]
impl ComputeBackend for ComputeClient {
    async fn vector_compute(
        &self,
        values: Vec<f32>,
        task_id: &str,
        task_type: Option<&str>,
    ) -> Result<VectorComputeOutcome, ComputeError> {
        let request = ComputeRequest {
            data: values,
            task_id: task_id.to_string(),
            task_type: task_type.unwrap_or(DEFAULT_TASK_TYPE).to_string(),
        };

        tracing::info!(task_id, task_type = %request.task_type, "Sending compute request to backend");
        let response = self
            .call(|mut stub| async move { stub.compute(request).await })
            .await?;
        tracing::info!(task_id, status = %response.status, "Received compute response from backend");

        if response.status != STATUS_COMPLETED {
            return Err(ComputeError::BackendReported {
                message: format!("Backend did not complete task {task_id}"),
                status: response.status,
            });
        }

        Ok(VectorComputeOutcome {
            result: response.result,
            task_id: response.task_id,
            status: response.status,
            execution_time_ms: response.execution_time_ms,
        })
    }

    async fn matrix_compute(&self, job: MatrixJob) -> Result<MatrixComputeOutcome, ComputeError> {
        let request = MatrixComputeRequest {
            matrix_a: Some(job.matrix_a.into()),
            matrix_b: job.matrix_b.map(Into::into),
            task_id: job.task_id,
            operation: job.operation.as_str().to_string(),
        };

        tracing::info!(
            task_id = %request.task_id,
            operation = %request.operation,
            "Sending matrix compute request to backend",
        );
        let response = self
            .call(|mut stub| async move { stub.matrix_compute(request).await })
            .await?;
        tracing::info!(
            task_id = %response.task_id,
            status = %response.status,
            "Received matrix compute response from backend",
        );

        Ok(MatrixComputeOutcome {
            result: response.result.map(Into::into),
            task_id: response.task_id,
            status: response.status,
            error_message: Some(response.error_message).filter(|m| !m.is_empty()),
            execution_time_ms: response.execution_time_ms,
        })
    }

    async fn status(&self, client_id: &str) -> Result<BackendStatus, ComputeError> {
        let request = StatusRequest {
            client_id: client_id.to_string(),
        };
        let response = self
            .call(|mut stub| async move { stub.status(request).await })
            .await?;

        Ok(BackendStatus {
            ready: response.ready,
            gpu_info: response.gpu_info,
            current_load: response.current_load,
            error: Some(response.error).filter(|e| !e.is_empty()),
        })
    }
}
