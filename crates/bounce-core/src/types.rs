use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable key for a live connection handle.
///
/// Generated by the server on accept. Senders and the connection arena store
/// this id instead of the handle itself, so a disconnect only has to drop the
/// arena entry and scrub the id from every sender.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_matches_inner_string() {
        let id = ConnectionId::from("conn-1");
        assert_eq!(id.to_string(), "conn-1");
        assert_eq!(id.as_str(), "conn-1");
    }
}
