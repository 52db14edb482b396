//! Wire format shared by every connection: one JSON object per text frame,
//! `{"event": string, "data": object, "timestamp": ISO-8601 string}`.

pub mod envelope;
pub mod error;

pub use envelope::{parse, parse_timestamp, serialize, Envelope, InboundEnvelope};
pub use error::ProtocolError;
