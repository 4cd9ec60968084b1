//! Best-effort fan-out hub for connected subscribers.
//!
//! [`BroadcastHub`] keeps the live subscriber set behind a copy-on-write
//! map: a broadcast clones the current `Arc` under a short read lock and
//! iterates that snapshot with no lock held, while register/unregister
//! swap in a modified copy under a short write lock. Neither side ever
//! waits on a subscriber.
//!
//! Each subscriber owns a bounded queue drained by its connection task.
//! Delivery is a non-blocking `try_send`: a full or closed queue loses the
//! event for that subscriber only.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use mlhybrid_core::types::Timestamp;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Text pushed to every subscriber right after it registers.
pub const ACK_MESSAGE: &str = "Connected to ML Hybrid System WebSocket";

/// Default per-subscriber queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Frames and ids
// ---------------------------------------------------------------------------

/// Outbound unit queued for a subscriber's connection task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// UTF-8 text payload. Encoded once per broadcast; every subscriber's
    /// clone shares the same buffer.
    Text(Bytes),
    /// Keep-alive probe.
    Ping,
    /// Ask the connection task to close the session.
    Close,
}

impl Frame {
    /// Text payload, if this is a text frame.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Frame::Text(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

/// Opaque handle identifying one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Returned by [`BroadcastHub::register`]: the id to unregister with and
/// the receiving half of the subscriber's queue.
pub struct Subscription {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Frame>,
}

#[derive(Clone)]
struct Subscriber {
    sender: mpsc::Sender<Frame>,
    connected_at: Timestamp,
}

impl Subscriber {
    /// A subscriber is open while its connection task still holds the
    /// receiver.
    fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }
}

type SubscriberMap = HashMap<SubscriberId, Subscriber>;

// ---------------------------------------------------------------------------
// BroadcastHub
// ---------------------------------------------------------------------------

/// Registry of connected subscribers with best-effort fan-out.
///
/// Designed to be wrapped in `Arc` and shared between the HTTP handlers
/// (which broadcast) and the WebSocket sessions (which register).
pub struct BroadcastHub {
    subscribers: RwLock<Arc<SubscriberMap>>,
    queue_capacity: usize,
}

impl BroadcastHub {
    /// Create a hub whose subscriber queues hold `queue_capacity` frames.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            subscribers: RwLock::new(Arc::new(HashMap::new())),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a new subscriber and queue the acknowledgement text.
    ///
    /// Every event broadcast after this returns is offered to the new
    /// subscriber.
    pub async fn register(&self) -> Subscription {
        let id = SubscriberId::new();
        let (sender, receiver) = mpsc::channel(self.queue_capacity);

        // Fresh queue with capacity >= 1, cannot be full.
        let _ = sender.try_send(Frame::Text(Bytes::from_static(ACK_MESSAGE.as_bytes())));

        let subscriber = Subscriber {
            sender,
            connected_at: chrono::Utc::now(),
        };
        {
            let mut guard = self.subscribers.write().await;
            Arc::make_mut(&mut guard).insert(id, subscriber);
        }

        tracing::info!(subscriber_id = %id, "Subscriber registered");
        Subscription { id, receiver }
    }

    /// Remove a subscriber and return how long it was registered.
    ///
    /// Unknown or already removed ids are ignored and return `None`.
    pub async fn unregister(&self, id: SubscriberId) -> Option<chrono::Duration> {
        let removed = {
            let mut guard = self.subscribers.write().await;
            if guard.contains_key(&id) {
                Arc::make_mut(&mut guard).remove(&id)
            } else {
                None
            }
        }?;

        let session = chrono::Utc::now() - removed.connected_at;
        tracing::info!(
            subscriber_id = %id,
            session_ms = session.num_milliseconds(),
            "Subscriber unregistered",
        );
        Some(session)
    }

    /// Serialize `event` once and offer it to every open subscriber.
    ///
    /// Returns the number of subscribers the event was queued for. Encoding
    /// and delivery failures are logged and never reach the caller.
    pub async fn broadcast<T: Serialize + ?Sized>(&self, event: &T) -> usize {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize broadcast event, dropping it");
                return 0;
            }
        };

        tracing::debug!(payload = %text, "Broadcasting event");
        self.fan_out(Frame::Text(Bytes::from(text))).await
    }

    /// Broadcast a plain text message.
    pub async fn send_text(&self, message: &str) -> usize {
        tracing::debug!(message, "Broadcasting text");
        self.fan_out(Frame::Text(Bytes::copy_from_slice(message.as_bytes()))).await
    }

    /// Queue a keep-alive ping for every subscriber.
    pub async fn ping_all(&self) -> usize {
        self.fan_out(Frame::Ping).await
    }

    /// Number of currently registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Queue a Close frame for every subscriber, then clear the set.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let drained = {
            let mut guard = self.subscribers.write().await;
            std::mem::take(&mut *guard)
        };
        for subscriber in drained.values() {
            let _ = subscriber.sender.try_send(Frame::Close);
        }
        tracing::info!(count = drained.len(), "Closed all subscribers");
    }

    // ---- private helpers ----

    async fn snapshot(&self) -> Arc<SubscriberMap> {
        Arc::clone(&*self.subscribers.read().await)
    }

    async fn fan_out(&self, frame: Frame) -> usize {
        let snapshot = self.snapshot().await;
        let mut delivered = 0;

        for (id, subscriber) in snapshot.iter() {
            if !subscriber.is_open() {
                tracing::trace!(subscriber_id = %id, "Skipping closed subscriber");
                continue;
            }
            match subscriber.sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(subscriber_id = %id, "Subscriber queue full, event dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber_id = %id, "Subscriber closed during broadcast");
                }
            }
        }

        delivered
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
