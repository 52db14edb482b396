use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::error::ProtocolError;

/// Server → Client broadcast.
/// Wire: `{ "event": "ping", "data": {...}, "timestamp": "2025-01-01T12:00:00.000000+00:00" }`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope {
    pub event: String,
    pub data: Value,
    #[serde(serialize_with = "iso8601_micros")]
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Stamp a payload with the current instant.
    pub fn now(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Utc::now(),
        }
    }
}

/// Numeric `+00:00` offset rather than `Z`: `datetime.fromisoformat` only
/// accepts `Z` from Python 3.11 on.
fn iso8601_micros<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, false))
}

/// Client → Server message, parsed leniently.
///
/// Every field is optional at this layer: a frame without `event` or
/// `timestamp` is expected traffic that the dispatcher drops, not a parse
/// failure. `timestamp` stays a string until the dispatcher needs it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InboundEnvelope {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl InboundEnvelope {
    /// Payload handed to the handler; absent `data` becomes `{}`.
    pub fn data_or_empty(&self) -> Value {
        self.data
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }
}

/// Decode one inbound text frame.
pub fn parse(text: &str) -> Result<InboundEnvelope, ProtocolError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ProtocolError::InvalidJson("frame is not a JSON object".to_string()));
    }
    // Wrong-typed fields (e.g. a numeric event) are a malformed frame too.
    serde_json::from_value(value).map_err(|e| ProtocolError::InvalidJson(e.to_string()))
}

/// Encode one outbound envelope.
pub fn serialize(envelope: &Envelope) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(envelope)?)
}

/// Parse an ISO-8601 instant.
///
/// Offset-carrying RFC 3339 strings are converted to UTC. Offset-less
/// strings (`2025-01-01T12:00:00.123456`, as produced by clients that
/// format naive local clocks) are taken to be UTC already.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ProtocolError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| ProtocolError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}
