use bounce_core::ConnectionId;
use bounce_protocol::ProtocolError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Everything that can go wrong between a parsed frame and the wire.
///
/// Only `Processing` and `Payload` ever leave the router as `Err`. The rest
/// are absorbed where they happen (logged, operation skipped) and surface
/// only as return values the caller may inspect.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Duplicate registration, or unregistration of an absent/different participant.
    #[error("Registry conflict for '{event}': {reason}")]
    Conflict { event: String, reason: ConflictReason },

    /// Envelope lacks `event` or `timestamp`, or the timestamp is unreadable.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// No handler registered for the event.
    #[error("No handler registered for '{event}'")]
    Unroutable { event: String },

    /// Timestamp older than the last accepted message for the event.
    #[error("Stale '{event}' message at {received} (last accepted {last_accepted})")]
    Stale {
        event: String,
        received: DateTime<Utc>,
        last_accepted: DateTime<Utc>,
    },

    /// A single connection write failed during a broadcast.
    #[error("Delivery to {conn_id} failed: {reason}")]
    Delivery { conn_id: ConnectionId, reason: String },

    /// A handler's business logic failed.
    #[error("Handler for '{event}' failed: {reason}")]
    Processing { event: String, reason: String },

    /// A sender could not produce its payload.
    #[error("Sender for '{event}' could not build payload: {reason}")]
    Payload { event: String, reason: String },

    /// A periodic task was requested for a sender without a usable period.
    #[error("Sender for '{event}' has no broadcast period")]
    NotPeriodic { event: String },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    AlreadyRegistered,
    NotRegistered,
    InstanceMismatch,
    /// A periodic task for the sender is still live.
    AlreadyRunning,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ConflictReason::AlreadyRegistered => "already registered",
            ConflictReason::NotRegistered => "not registered",
            ConflictReason::InstanceMismatch => "registered instance does not match",
            ConflictReason::AlreadyRunning => "periodic broadcast already running",
        };
        f.write_str(text)
    }
}

impl RouterError {
    pub fn processing(event: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        RouterError::Processing {
            event: event.into(),
            reason: reason.to_string(),
        }
    }

    pub fn payload(event: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        RouterError::Payload {
            event: event.into(),
            reason: reason.to_string(),
        }
    }

    pub fn delivery(conn_id: &ConnectionId, reason: impl std::fmt::Display) -> Self {
        RouterError::Delivery {
            conn_id: conn_id.clone(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;
