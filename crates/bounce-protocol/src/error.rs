use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame is not a JSON object.
    #[error("Invalid JSON frame: {0}")]
    InvalidJson(String),

    /// The `timestamp` field is present but not an ISO-8601 instant.
    #[error("Invalid timestamp '{value}': {reason}")]
    InvalidTimestamp { value: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
