use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::error::Result;
use crate::registry::Participant;
use crate::sender::Sender;

/// Consumes inbound payloads for one event.
#[async_trait]
pub trait Handler: Participant {
    /// Business logic. An error propagates out of the dispatcher to the
    /// connection's receive loop and the coupled sender is not triggered.
    async fn process_data(&self, data: Value) -> Result<()>;

    /// Sender to broadcast after every successful `process_data`.
    fn coupled_sender(&self) -> Option<Arc<dyn Sender>> {
        None
    }

    /// Entry point used by the dispatcher: process, then broadcast through
    /// the coupled sender if there is one.
    async fn handle(&self, data: Value) -> Result<()> {
        self.process_data(data).await?;

        if let Some(sender) = self.coupled_sender() {
            let report = sender.send().await?;
            if report.is_partial() {
                warn!(
                    event = self.event_name(),
                    sender = sender.event_name(),
                    failed = report.failed.len(),
                    "coupled broadcast partially failed"
                );
            }
        }
        Ok(())
    }
}
