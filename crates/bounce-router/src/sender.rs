use std::time::Duration;

use async_trait::async_trait;
use bounce_core::{config::SEND_TIMEOUT_MS, ConnectionId};
use futures_util::future::join_all;
use bounce_protocol::Envelope;
use serde_json::Value;
use tracing::{debug, warn};

use crate::connection::ConnectionSet;
use crate::error::{Result, RouterError};
use crate::registry::Participant;

/// Produces outbound payloads for one event and fans them out.
///
/// Implementors supply the payload and own a [`ConnectionSet`] built on the
/// dispatcher's arena; `send` and the connection bookkeeping are provided.
#[async_trait]
pub trait Sender: Participant {
    /// Build the `data` field of the next envelope. An error aborts this
    /// broadcast before any connection is written.
    async fn produce_payload(&self) -> Result<Value>;

    fn connections(&self) -> &ConnectionSet;

    /// Broadcast period for senders that run on a timer. `None` means the
    /// sender only fires on demand.
    fn period(&self) -> Option<Duration> {
        None
    }

    /// Upper bound on one connection's write during `send`.
    fn send_timeout(&self) -> Duration {
        Duration::from_millis(SEND_TIMEOUT_MS)
    }

    /// Idempotent: a handle already in the set is not added twice.
    fn add_connection(&self, id: ConnectionId) {
        if self.connections().insert(id.clone()) {
            debug!(event = self.event_name(), conn_id = %id, "connection added to sender");
        }
    }

    /// No-op if the handle is not in the set.
    fn remove_connection(&self, id: &ConnectionId) {
        if self.connections().remove(id) {
            debug!(event = self.event_name(), conn_id = %id, "connection removed from sender");
        }
    }

    /// Build one envelope and write it to every connection in the set.
    ///
    /// Write failures are isolated per connection and reported in the
    /// returned [`DeliveryReport`]; they never make `send` fail. A write
    /// that outlasts `send_timeout` counts as failed. Failing
    /// connections stay in the set until the transport reports a disconnect.
    async fn send(&self) -> Result<DeliveryReport> {
        let data = self.produce_payload().await?;
        let envelope = Envelope::now(self.event_name(), data);
        let text = bounce_protocol::serialize(&envelope)?;
        Ok(fan_out(self.event_name(), &text, self.connections(), self.send_timeout()).await)
    }
}

/// What happened to one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: Vec<ConnectionId>,
}

impl DeliveryReport {
    pub fn attempted(&self) -> usize {
        self.delivered + self.failed.len()
    }

    /// At least one connection missed the frame.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Write `text` to a snapshot of `connections`, all writes in flight at once.
async fn fan_out(
    event: &str,
    text: &str,
    connections: &ConnectionSet,
    timeout: Duration,
) -> DeliveryReport {
    let targets = connections.resolve();
    let writes = targets.iter().map(|conn| async move {
        match tokio::time::timeout(timeout, conn.send_text(text)).await {
            Ok(result) => result,
            Err(_) => Err(RouterError::delivery(
                conn.id(),
                format!("write timed out after {}ms", timeout.as_millis()),
            )),
        }
    });
    let outcomes = join_all(writes).await;

    let mut report = DeliveryReport::default();
    for (conn, outcome) in targets.iter().zip(outcomes) {
        match outcome {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                warn!(event, conn_id = %conn.id(), error = %e, "failed to send message");
                report.failed.push(conn.id().clone());
            }
        }
    }
    debug!(
        event,
        delivered = report.delivered,
        failed = report.failed.len(),
        "broadcast complete"
    );
    report
}

/// Convert a frame rate (broadcasts per second) into a period.
///
/// Returns `None` for rates that don't describe a usable timer: zero,
/// negative, NaN, infinite, or so large the period rounds to nothing.
pub fn framerate_period(framerate: f64) -> Option<Duration> {
    if !framerate.is_finite() || framerate <= 0.0 {
        return None;
    }
    let period = Duration::try_from_secs_f64(1.0 / framerate).ok()?;
    (!period.is_zero()).then_some(period)
}
