use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use mlhybrid_compute::{ComputeBackend, ComputeClient, ComputeOptions};
use mlhybrid_events::heartbeat::HEARTBEAT_INTERVAL_SECS;
use mlhybrid_events::{start_heartbeat, BroadcastHub};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mlhybrid_api::config::ServerConfig;
use mlhybrid_api::router::build_app_router;
use mlhybrid_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mlhybrid_api=debug,mlhybrid_compute=debug,mlhybrid_events=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Compute backend ---
    let compute = Arc::new(
        ComputeClient::connect(
            &config.compute_host,
            config.compute_port,
            ComputeOptions {
                rpc_timeout: config.compute_rpc_timeout(),
            },
        )
        .await
        .context("Failed to connect to compute backend")?,
    );

    // --- Broadcast hub ---
    let hub = Arc::new(BroadcastHub::new(config.subscriber_queue_capacity));

    // --- Heartbeat ---
    let heartbeat_handle = start_heartbeat(
        Arc::clone(&hub),
        Duration::from_secs(HEARTBEAT_INTERVAL_SECS),
    );

    // --- App state ---
    let backend: Arc<dyn ComputeBackend> = compute.clone();
    let state = AppState::new(config.clone(), Arc::clone(&hub), backend);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let host: IpAddr = config
        .host
        .parse()
        .with_context(|| format!("Invalid HOST address '{}'", config.host))?;
    let addr = SocketAddr::new(host, config.port);
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let outcome = compute.shutdown(config.compute_shutdown_timeout()).await;
    tracing::info!(?outcome, "Compute client shut down");

    let subscriber_count = hub.subscriber_count().await;
    tracing::info!(subscriber_count, "Closing remaining WebSocket subscribers");
    hub.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
