use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, error};

use crate::error::{ConflictReason, Result, RouterError};

/// Anything that can be keyed by an event name in an [`EventRegistry`].
pub trait Participant: Send + Sync {
    fn event_name(&self) -> &str;
}

/// Event name → exactly one participant.
///
/// Used twice by the dispatcher (handlers and senders) with no shared state.
/// Conflicts are logged here and returned to the caller, who is free to
/// ignore them: a rejected registration leaves the registry unchanged.
pub struct EventRegistry<P: ?Sized + Participant> {
    /// Label for log lines ("handler" / "sender").
    kind: &'static str,
    entries: DashMap<String, Arc<P>>,
}

impl<P: ?Sized + Participant> EventRegistry<P> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    /// Insert unless the event already has a participant; the existing one is kept.
    pub fn register(&self, participant: Arc<P>) -> Result<()> {
        let event = participant.event_name().to_string();
        match self.entries.entry(event.clone()) {
            Entry::Occupied(_) => {
                error!(kind = self.kind, event = %event, "already registered, ignoring");
                Err(RouterError::Conflict {
                    event,
                    reason: ConflictReason::AlreadyRegistered,
                })
            }
            Entry::Vacant(slot) => {
                slot.insert(participant);
                debug!(kind = self.kind, event = %event, "registered");
                Ok(())
            }
        }
    }

    /// Remove only if `participant` is the very instance stored under its event.
    pub fn unregister(&self, participant: &Arc<P>) -> Result<()> {
        let event = participant.event_name();
        if !self.entries.contains_key(event) {
            error!(kind = self.kind, event, "nothing registered, can't unregister");
            return Err(RouterError::Conflict {
                event: event.to_string(),
                reason: ConflictReason::NotRegistered,
            });
        }

        // Identity check and removal under the same shard lock.
        match self
            .entries
            .remove_if(event, |_, stored| Arc::ptr_eq(stored, participant))
        {
            Some(_) => {
                debug!(kind = self.kind, event, "unregistered");
                Ok(())
            }
            None => {
                // Either a different instance, or it vanished between the two calls.
                let reason = if self.entries.contains_key(event) {
                    ConflictReason::InstanceMismatch
                } else {
                    ConflictReason::NotRegistered
                };
                error!(kind = self.kind, event, %reason, "can't unregister");
                Err(RouterError::Conflict {
                    event: event.to_string(),
                    reason,
                })
            }
        }
    }

    pub fn get(&self, event: &str) -> Option<Arc<P>> {
        self.entries.get(event).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, event: &str) -> bool {
        self.entries.contains_key(event)
    }

    /// Snapshot of registered event names, in no particular order.
    pub fn registered_events(&self) -> Vec<String> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Snapshot of registered participants, in no particular order.
    pub fn participants(&self) -> Vec<Arc<P>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
