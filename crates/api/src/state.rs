use std::sync::Arc;

use mlhybrid_compute::ComputeBackend;
use mlhybrid_events::BroadcastHub;

use crate::config::ServerConfig;
use crate::gateway::TaskGateway;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Registry of connected WebSocket subscribers.
    pub hub: Arc<BroadcastHub>,
    /// Compute backend, used directly by the status probes.
    pub backend: Arc<dyn ComputeBackend>,
    /// Job orchestration over `hub` and `backend`.
    pub gateway: Arc<TaskGateway>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        hub: Arc<BroadcastHub>,
        backend: Arc<dyn ComputeBackend>,
    ) -> Self {
        let gateway = Arc::new(TaskGateway::new(Arc::clone(&hub), Arc::clone(&backend)));
        Self {
            config: Arc::new(config),
            hub,
            backend,
            gateway,
        }
    }
}
