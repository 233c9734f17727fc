//! Relay WebSocket handler
//!
//! Upgrades `/relay` requests and runs one dispatch loop per client socket:
//! client frames, upstream session events, relay timers, the idle timer and
//! server shutdown are all handled from a single `select!`.

use axum::{
    Extension,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, Instant, sleep, timeout};
use tokio::select;
use tracing::{debug, error, info, warn};

use crate::core::realtime::ClientNotification;
use crate::middleware::ClientIp;
use crate::relay::{ConnectionId, RelayConnection};
use crate::state::{AppState, ConnectionSlot};

/// Notifications buffered for the client writer
const CHANNEL_BUFFER_SIZE: usize = 256;

/// Maximum WebSocket frame size (10 MB)
const MAX_WS_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Maximum WebSocket message size (12 MB, base64 of the largest media payload)
const MAX_WS_MESSAGE_SIZE: usize = 12 * 1024 * 1024;

/// How long the writer gets to flush queued notifications on close
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Relay WebSocket handler
///
/// The connection slot reserved by the limit middleware travels with the
/// socket and is released when the socket task ends.
pub async fn relay_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    client_ip: Option<Extension<ClientIp>>,
) -> Response {
    let slot = client_ip.map(|Extension(ClientIp(ip))| ConnectionSlot::new(state.clone(), ip));
    info!(ip = ?slot.as_ref().map(ConnectionSlot::ip), "Relay WebSocket connection upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_relay_socket(socket, state, slot))
}

async fn handle_relay_socket(socket: WebSocket, state: Arc<AppState>, _slot: Option<ConnectionSlot>) {
    let id = ConnectionId::new();
    let cancel = state.registry.register(id);
    info!(connection_id = %id, "Relay WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (notify_tx, mut notify_rx) = mpsc::channel::<ClientNotification>(CHANNEL_BUFFER_SIZE);

    // Writer task: drains notifications, then closes the socket
    let writer = tokio::spawn(async move {
        while let Some(notification) = notify_rx.recv().await {
            let json = match serde_json::to_string(&notification) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize notification: {}", e);
                    continue;
                }
            };
            if let Err(e) = sender.send(Message::Text(json.into())).await {
                debug!(connection_id = %id, "Failed to send WebSocket message: {}", e);
                return;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });
    let writer_abort = writer.abort_handle();

    let mut relay = RelayConnection::new(
        id,
        state.registry.clone(),
        state.connector.clone(),
        state.relay_config.clone(),
        notify_tx,
    );

    let idle_timeout = state.relay_config.idle_timeout();
    let idle = sleep(idle_timeout);
    tokio::pin!(idle);

    loop {
        select! {
            _ = cancel.cancelled() => {
                info!(connection_id = %id, "Server shutting down, closing relay connection");
                break;
            }
            msg = receiver.next() => {
                idle.as_mut().reset(Instant::now() + idle_timeout);
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        relay.handle_client_text(text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(data))) => match std::str::from_utf8(&data) {
                        Ok(text) => relay.handle_client_text(text).await,
                        Err(_) => debug!(connection_id = %id, "Ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => {
                        info!(connection_id = %id, "Relay WebSocket connection closed by client");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection_id = %id, "Relay WebSocket error: {}", e);
                        break;
                    }
                }
            }
            wake = relay.next_wake() => {
                relay.handle_wake(wake).await;
            }
            _ = &mut idle => {
                warn!(
                    connection_id = %id,
                    idle_secs = idle_timeout.as_secs(),
                    "Relay WebSocket connection idle, closing"
                );
                break;
            }
        }
    }

    relay.close().await;
    drop(relay);

    if timeout(WRITER_DRAIN_TIMEOUT, writer).await.is_err() {
        writer_abort.abort();
    }

    info!(connection_id = %id, "Relay WebSocket connection terminated");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send<T: Send>(_: &T) {}

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_relay_socket_task_is_send() {
        assert_send_sync::<RelayConnection>();

        // Type-checks the future handed to `on_upgrade`; never polled
        let _ = |socket: WebSocket, state: Arc<AppState>| {
            let task = handle_relay_socket(socket, state, None);
            assert_send(&task);
        };
    }
}
