use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use bounce_core::ConnectionId;
use bounce_router::{Connection, RouterError};
use futures_util::{stream::SplitSink, SinkExt};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Frames queued for one client's socket writer.
pub type Outbound = mpsc::Sender<Message>;

/// Router-facing handle for one WebSocket client.
///
/// Writes only enqueue; the socket itself is written by [`write_loop`], so a
/// client that stops reading fills its own queue and nobody else's.
pub struct WsConnection {
    id: ConnectionId,
    outbound: Outbound,
}

impl WsConnection {
    pub fn new(id: ConnectionId, outbound: Outbound) -> Self {
        Self { id, outbound }
    }
}

#[async_trait]
impl Connection for WsConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send_text(&self, text: &str) -> bounce_router::Result<()> {
        self.outbound
            .try_send(Message::Text(text.into()))
            .map_err(|e| match e {
                TrySendError::Full(_) => RouterError::delivery(&self.id, "outbound queue full"),
                TrySendError::Closed(_) => RouterError::delivery(&self.id, "connection closed"),
            })
    }
}

/// Drain queued frames into the socket until every producer is gone or a write fails.
pub async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut queued: mpsc::Receiver<Message>,
) {
    while let Some(msg) = queued.recv().await {
        if sink.send(msg).await.is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn full_queue_fails_fast() {
        let (tx, mut rx) = mpsc::channel(1);
        let conn = WsConnection::new("c1".into(), tx);

        conn.send_text("first").await.unwrap();
        let err = conn.send_text("second").await.unwrap_err();

        assert!(matches!(err, RouterError::Delivery { .. }));
        assert!(matches!(rx.recv().await, Some(Message::Text(t)) if t.as_str() == "first"));
    }

    #[tokio::test]
    async fn closed_writer_reports_delivery_error() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let conn = WsConnection::new("c1".into(), tx);

        let err = conn.send_text("late").await.unwrap_err();

        assert!(matches!(err, RouterError::Delivery { .. }));
    }
}
