use std::sync::Arc;

use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use mlhybrid_events::{BroadcastHub, Frame};

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with the `BroadcastHub`
/// and driven by a sender task plus the inbound loop.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Manage a single subscriber session after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers with the hub, which queues the acknowledgement text.
///   2. Spawns a sender task that forwards queued frames to the sink.
///   3. Logs inbound text; clients never send commands.
///   4. Unregisters on close or error.
async fn handle_socket(socket: WebSocket, hub: Arc<BroadcastHub>) {
    let subscription = hub.register().await;
    let subscriber_id = subscription.id;
    let mut rx = subscription.receiver;
    tracing::info!(%subscriber_id, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward hub frames to the WebSocket sink.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let closing = frame == Frame::Close;
            let msg = match frame {
                // Shares the hub's buffer; only the UTF-8 check runs here.
                Frame::Text(bytes) => match Utf8Bytes::try_from(bytes) {
                    Ok(text) => Message::Text(text),
                    Err(e) => {
                        tracing::warn!(%subscriber_id, error = %e, "Dropping non-UTF-8 frame");
                        continue;
                    }
                },
                Frame::Ping => Message::Ping(Default::default()),
                Frame::Close => Message::Close(None),
            };
            if sink.send(msg).await.is_err() {
                tracing::debug!(%subscriber_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Receiver loop: inbound messages carry no commands.
    let recv_loop = async {
        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(Message::Text(text)) => {
                    tracing::debug!(%subscriber_id, message = %text.as_str(), "Ignoring inbound WebSocket text");
                }
                Ok(Message::Pong(_)) => {
                    tracing::trace!(%subscriber_id, "Pong received");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(%subscriber_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    };

    // Whichever side finishes first ends the session.
    tokio::select! {
        _ = recv_loop => {}
        _ = &mut send_task => {}
    }

    let session = hub.unregister(subscriber_id).await;
    send_task.abort();
    tracing::info!(
        %subscriber_id,
        session_secs = session.map(|d| d.num_seconds()),
        "WebSocket disconnected",
    );
}
