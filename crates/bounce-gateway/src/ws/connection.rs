use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use bounce_core::{
    config::{MAX_PAYLOAD_BYTES, OUTBOUND_QUEUE_CAPACITY},
    ConnectionId,
};
use bounce_router::DispatchOutcome;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::ws::send::{self, WsConnection};

/// How long the writer may keep flushing after the client goes away.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Axum handler: upgrades HTTP to WebSocket on the configured route.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection receive loop, alive for the entire WS session.
///
/// Outbound traffic never passes through here: senders enqueue through the
/// `WsConnection` handle registered with the dispatcher, and a separate
/// writer task owns the socket's write half.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = ConnectionId::new();
    let (tx, mut rx) = socket.split();
    let (outbound, queued) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let mut writer = tokio::spawn(send::write_loop(tx, queued));

    state
        .dispatcher
        .connect(Arc::new(WsConnection::new(conn_id.clone(), outbound.clone())));
    info!(conn_id = %conn_id, "new WS connection");

    while let Some(msg) = rx.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if text.len() > MAX_PAYLOAD_BYTES {
                    warn!(conn_id = %conn_id, size = text.len(), "payload too large");
                    break;
                }
                match state.dispatcher.dispatch_text(text.as_str()).await {
                    Ok(DispatchOutcome::Handled) => {}
                    Ok(DispatchOutcome::Dropped(reason)) => {
                        debug!(conn_id = %conn_id, reason = %reason, "message dropped");
                    }
                    // connection stays open; the client may send a valid message next
                    Err(e) => {
                        error!(conn_id = %conn_id, error = %e, "error processing message");
                    }
                }
            }
            Ok(Message::Ping(data)) => {
                if outbound.try_send(Message::Pong(data)).is_err() {
                    debug!(conn_id = %conn_id, "pong dropped, outbound queue full");
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WS read failed");
                break;
            }
        }
    }

    state.dispatcher.disconnect(&conn_id);
    drop(outbound);
    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        writer.abort();
    }
    info!(conn_id = %conn_id, "WS connection closed");
}
