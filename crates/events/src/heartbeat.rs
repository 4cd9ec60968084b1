use std::sync::Arc;
use std::time::Duration;

use crate::hub::BroadcastHub;

/// Interval between heartbeat pings (in seconds).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Spawn a background task that queues periodic Ping frames for every
/// subscriber.
///
/// The task runs until aborted through the returned `JoinHandle` (done
/// during shutdown).
pub fn start_heartbeat(hub: Arc<BroadcastHub>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let count = hub.ping_all().await;
            tracing::debug!(count, "Subscriber heartbeat ping");
        }
    })
}
