use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

/// Result of comparing an inbound timestamp with an event's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Accepted; the clock now reads the message's timestamp.
    Accepted,
    /// Older than the last accepted message; clock untouched.
    Stale { last_accepted: DateTime<Utc> },
    /// No handler was ever registered for the event.
    Untracked,
}

/// Per-event "last accepted" clock.
///
/// A clock starts at the moment its handler is registered, so a message
/// stamped before registration is always stale. Clocks only move forward,
/// except through [`StalenessGuard::refresh`].
pub struct StalenessGuard {
    clocks: DashMap<String, DateTime<Utc>>,
}

impl StalenessGuard {
    pub fn new() -> Self {
        Self {
            clocks: DashMap::new(),
        }
    }

    /// Start tracking `event` with its clock at now.
    pub fn track(&self, event: &str) {
        self.track_at(event, Utc::now());
    }

    pub fn track_at(&self, event: &str, at: DateTime<Utc>) {
        self.clocks.insert(event.to_string(), at);
    }

    pub fn untrack(&self, event: &str) {
        self.clocks.remove(event);
    }

    pub fn is_tracked(&self, event: &str) -> bool {
        self.clocks.contains_key(event)
    }

    pub fn last_accepted(&self, event: &str) -> Option<DateTime<Utc>> {
        self.clocks.get(event).map(|clock| *clock)
    }

    /// Compare and advance in one step.
    ///
    /// Holding the entry across compare and store means two racing messages
    /// for the same event can't both pass against the same old clock.
    pub fn check(&self, event: &str, timestamp: DateTime<Utc>) -> Verdict {
        let Some(mut clock) = self.clocks.get_mut(event) else {
            return Verdict::Untracked;
        };
        if timestamp < *clock {
            return Verdict::Stale {
                last_accepted: *clock,
            };
        }
        *clock = timestamp;
        Verdict::Accepted
    }

    /// Re-baseline every clock to now.
    pub fn refresh(&self) {
        let now = Utc::now();
        for mut clock in self.clocks.iter_mut() {
            *clock = now;
        }
        debug!(events = self.clocks.len(), "staleness clocks refreshed");
    }

    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }
}

impl Default for StalenessGuard {
    fn default() -> Self {
        Self::new()
    }
}
