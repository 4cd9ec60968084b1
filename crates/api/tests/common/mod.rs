#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use mlhybrid_compute::{
    BackendStatus, ComputeBackend, ComputeError, MatrixComputeOutcome, MatrixJob,
    VectorComputeOutcome, STATUS_COMPLETED,
};
use mlhybrid_core::matrix::{Matrix, MatrixOperation};
use mlhybrid_events::{BroadcastHub, Subscription};
use tower::ServiceExt;

use mlhybrid_api::config::ServerConfig;
use mlhybrid_api::router::build_app_router;
use mlhybrid_api::state::AppState;

// ---------------------------------------------------------------------------
// Scripted backend
// ---------------------------------------------------------------------------

/// In-process compute backend whose behaviour is picked by the job itself.
///
/// Vector task types:
/// - `"sum"` returns the sum of the values.
/// - `"reject"` is refused by the backend.
/// - `"unreachable"` fails at the transport level.
/// - `"panic"` panics inside the call.
/// - anything else doubles every value.
///
/// Matrix operations: `transpose` and `add` are computed, `inverse` is
/// reported as singular, `multiply` fails at the transport level and
/// `subtract` claims completion without returning a matrix.
#[derive(Default)]
pub struct ScriptedBackend {
    pub vector_calls: AtomicUsize,
    pub matrix_calls: AtomicUsize,
    pub unhealthy: bool,
}

impl ScriptedBackend {
    pub fn unhealthy() -> Self {
        Self {
            unhealthy: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.vector_calls.load(Ordering::SeqCst) + self.matrix_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputeBackend for ScriptedBackend {
    async fn vector_compute(
        &self,
        values: Vec<f32>,
        task_id: &str,
        task_type: Option<&str>,
    ) -> Result<VectorComputeOutcome, ComputeError> {
        self.vector_calls.fetch_add(1, Ordering::SeqCst);

        let result = match task_type.unwrap_or("default") {
            "sum" => vec![values.iter().sum()],
            "reject" => {
                return Err(ComputeError::BackendReported {
                    status: "failed".into(),
                    message: "Unsupported task type".into(),
                })
            }
            "unreachable" => {
                return Err(ComputeError::Transport("connection refused".into()));
            }
            "panic" => panic!("backend blew up"),
            _ => values.iter().map(|v| v * 2.0).collect(),
        };

        Ok(VectorComputeOutcome {
            result,
            task_id: task_id.to_string(),
            status: STATUS_COMPLETED.to_string(),
            execution_time_ms: 4,
        })
    }

    async fn matrix_compute(&self, job: MatrixJob) -> Result<MatrixComputeOutcome, ComputeError> {
        self.matrix_calls.fetch_add(1, Ordering::SeqCst);

        let a = &job.matrix_a;
        let completed = |result: Matrix| MatrixComputeOutcome {
            result: Some(result),
            task_id: job.task_id.clone(),
            status: STATUS_COMPLETED.to_string(),
            error_message: None,
            execution_time_ms: 12,
        };

        match job.operation {
            MatrixOperation::Transpose => {
                let mut data = Vec::with_capacity(a.data.len());
                for c in 0..a.cols {
                    for r in 0..a.rows {
                        data.push(a.get(r, c).unwrap_or_default());
                    }
                }
                Ok(completed(Matrix::new(a.cols, a.rows, data)))
            }
            MatrixOperation::Add => {
                let b = job.matrix_b.clone().unwrap_or_default();
                let data = a.data.iter().zip(&b.data).map(|(x, y)| x + y).collect();
                Ok(completed(Matrix::new(a.rows, a.cols, data)))
            }
            MatrixOperation::Inverse => Ok(MatrixComputeOutcome {
                result: None,
                task_id: job.task_id.clone(),
                status: "failed".into(),
                error_message: Some("Matrix is singular and cannot be inverted".into()),
                execution_time_ms: 3,
            }),
            MatrixOperation::Multiply => Err(ComputeError::Transport("deadline exceeded".into())),
            MatrixOperation::Subtract => Ok(MatrixComputeOutcome {
                result: None,
                task_id: job.task_id.clone(),
                status: STATUS_COMPLETED.to_string(),
                error_message: None,
                execution_time_ms: 2,
            }),
        }
    }

    async fn status(&self, client_id: &str) -> Result<BackendStatus, ComputeError> {
        if self.unhealthy {
            return Err(ComputeError::Transport("connection refused".into()));
        }
        Ok(BackendStatus {
            ready: true,
            gpu_info: format!("Stub GPU for {client_id}"),
            current_load: 0.25,
            error: None,
        })
    }
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        compute_host: "stub".to_string(),
        ..ServerConfig::default()
    }
}

/// The router plus handles on the pieces tests inspect.
pub struct TestApp {
    pub router: Router,
    pub hub: Arc<BroadcastHub>,
    pub backend: Arc<ScriptedBackend>,
}

/// Build the full application router around a [`ScriptedBackend`].
pub fn build_test_app() -> TestApp {
    build_test_app_with(ScriptedBackend::default())
}

pub fn build_test_app_with(backend: ScriptedBackend) -> TestApp {
    let config = test_config();
    let hub = Arc::new(BroadcastHub::new(config.subscriber_queue_capacity));
    let backend = Arc::new(backend);

    let dyn_backend: Arc<dyn ComputeBackend> = backend.clone();
    let state = AppState::new(config.clone(), Arc::clone(&hub), dyn_backend);

    TestApp {
        router: build_app_router(state, &config),
        hub,
        backend,
    }
}

// ---------------------------------------------------------------------------
// Subscriber recording
// ---------------------------------------------------------------------------

/// Register a subscriber and consume its acknowledgement frame.
pub async fn subscribe(hub: &BroadcastHub) -> Subscription {
    let mut sub = hub.register().await;
    let ack = sub.receiver.recv().await.expect("ack frame");
    assert_eq!(
        ack.as_text(),
        Some(mlhybrid_events::hub::ACK_MESSAGE)
    );
    sub
}

/// Everything queued for `sub` so far, parsed as JSON.
///
/// Broadcasts finish before the response is returned, so after a request
/// completes every event it produced is already queued.
pub fn drain_events(sub: &mut Subscription) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    while let Ok(frame) = sub.receiver.try_recv() {
        if let Some(text) = frame.as_text() {
            events.push(serde_json::from_str(text).expect("event frames carry JSON"));
        }
    }
    events
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}
