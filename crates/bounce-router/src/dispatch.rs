use std::sync::{Arc, Mutex};

use bounce_core::ConnectionId;
use bounce_protocol::InboundEnvelope;
use tracing::{debug, info, warn};

use crate::connection::{Connection, ConnectionArena};
use crate::error::{Result, RouterError};
use crate::handler::Handler;
use crate::registry::EventRegistry;
use crate::sender::Sender;
use crate::staleness::{StalenessGuard, Verdict};

/// What the dispatcher did with one inbound message.
///
/// Dropping a message is normal traffic, not a failure: the reason is
/// returned for inspection and has already been logged.
#[derive(Debug)]
pub enum DispatchOutcome {
    Handled,
    Dropped(RouterError),
}

impl DispatchOutcome {
    pub fn is_handled(&self) -> bool {
        matches!(self, DispatchOutcome::Handled)
    }

    pub fn dropped_reason(&self) -> Option<&RouterError> {
        match self {
            DispatchOutcome::Handled => None,
            DispatchOutcome::Dropped(reason) => Some(reason),
        }
    }
}

/// The dispatch-and-broadcast core.
///
/// Owns the handler and sender registries, the staleness clocks and the
/// connection arena. Construct one per server (or per test) and pass it
/// around as `Arc<Dispatcher>`.
pub struct Dispatcher {
    handlers: EventRegistry<dyn Handler>,
    senders: EventRegistry<dyn Sender>,
    clocks: StalenessGuard,
    /// Held across a handler's registry change and its clock change, so the
    /// two never interleave with another register/unregister.
    handler_lifecycle: Mutex<()>,
    arena: Arc<ConnectionArena>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_arena(Arc::new(ConnectionArena::new()))
    }

    pub fn with_arena(arena: Arc<ConnectionArena>) -> Self {
        Self {
            handlers: EventRegistry::new("handler"),
            senders: EventRegistry::new("sender"),
            clocks: StalenessGuard::new(),
            handler_lifecycle: Mutex::new(()),
            arena,
        }
    }

    /// Arena every sender's `ConnectionSet` must be built on.
    pub fn arena(&self) -> &Arc<ConnectionArena> {
        &self.arena
    }

    // ------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------

    /// Register and start the event's staleness clock at now.
    pub fn register_handler(&self, handler: Arc<dyn Handler>) -> Result<()> {
        let event = handler.event_name().to_string();
        let _lifecycle = self
            .handler_lifecycle
            .lock()
            .expect("handler lifecycle poisoned");
        self.handlers.register(handler)?;
        self.clocks.track(&event);
        info!(event = %event, "handler registered");
        Ok(())
    }

    /// Unregister the exact instance and drop its staleness clock.
    pub fn unregister_handler(&self, handler: &Arc<dyn Handler>) -> Result<()> {
        let _lifecycle = self
            .handler_lifecycle
            .lock()
            .expect("handler lifecycle poisoned");
        self.handlers.unregister(handler)?;
        self.clocks.untrack(handler.event_name());
        info!(event = handler.event_name(), "handler unregistered");
        Ok(())
    }

    pub fn get_handler(&self, event: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(event)
    }

    pub fn registered_handler_events(&self) -> Vec<String> {
        self.handlers.registered_events()
    }

    pub fn handlers(&self) -> Vec<Arc<dyn Handler>> {
        self.handlers.participants()
    }

    // ------------------------------------------------------------------
    // Senders
    // ------------------------------------------------------------------

    pub fn register_sender(&self, sender: Arc<dyn Sender>) -> Result<()> {
        if !Arc::ptr_eq(sender.connections().arena(), &self.arena) {
            warn!(
                event = sender.event_name(),
                "sender built on a foreign connection arena; its broadcasts will reach no one"
            );
        }
        let event = sender.event_name().to_string();
        self.senders.register(sender)?;
        info!(event = %event, "sender registered");
        Ok(())
    }

    pub fn unregister_sender(&self, sender: &Arc<dyn Sender>) -> Result<()> {
        self.senders.unregister(sender)?;
        info!(event = sender.event_name(), "sender unregistered");
        Ok(())
    }

    pub fn get_sender(&self, event: &str) -> Option<Arc<dyn Sender>> {
        self.senders.get(event)
    }

    pub fn registered_sender_events(&self) -> Vec<String> {
        self.senders.registered_events()
    }

    pub fn senders(&self) -> Vec<Arc<dyn Sender>> {
        self.senders.participants()
    }

    /// Sender registry, for the periodic scheduler.
    pub fn sender_registry(&self) -> &EventRegistry<dyn Sender> {
        &self.senders
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Put a new handle in the arena and subscribe it to every registered sender.
    pub fn connect(&self, connection: Arc<dyn Connection>) -> ConnectionId {
        let id = self.arena.insert(connection);
        for sender in self.senders.participants() {
            sender.add_connection(id.clone());
        }
        debug!(conn_id = %id, senders = self.senders.len(), "connection attached");
        id
    }

    /// Unsubscribe the handle from every sender, then drop it from the arena.
    pub fn disconnect(&self, id: &ConnectionId) {
        for sender in self.senders.participants() {
            sender.remove_connection(id);
        }
        if self.arena.remove(id).is_some() {
            debug!(conn_id = %id, "connection detached");
        }
    }

    pub fn connection_count(&self) -> usize {
        self.arena.len()
    }

    // ------------------------------------------------------------------
    // Staleness
    // ------------------------------------------------------------------

    /// Reset every staleness clock to now.
    pub fn refresh(&self) {
        self.clocks.refresh();
    }

    pub fn last_accepted(&self, event: &str) -> Option<chrono::DateTime<chrono::Utc>> {
        self.clocks.last_accepted(event)
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Decode one text frame and dispatch it. Undecodable frames are dropped.
    pub async fn dispatch_text(&self, text: &str) -> Result<DispatchOutcome> {
        match bounce_protocol::parse(text) {
            Ok(envelope) => self.dispatch(envelope).await,
            Err(e) => {
                warn!(error = %e, "invalid JSON received");
                Ok(DispatchOutcome::Dropped(e.into()))
            }
        }
    }

    /// Route one parsed message to its handler.
    ///
    /// `Err` is reserved for handler failures (including a coupled sender
    /// failing to build its payload); every other outcome is a logged drop.
    pub async fn dispatch(&self, envelope: InboundEnvelope) -> Result<DispatchOutcome> {
        let Some(event) = envelope.event.as_deref() else {
            info!("received message without 'event' specified");
            return Ok(dropped(RouterError::Malformed("missing 'event'".to_string())));
        };

        let Some(raw_timestamp) = envelope.timestamp.as_deref() else {
            info!(event, "received message without 'timestamp' specified");
            return Ok(dropped(RouterError::Malformed("missing 'timestamp'".to_string())));
        };

        let timestamp = match bounce_protocol::parse_timestamp(raw_timestamp) {
            Ok(ts) => ts,
            Err(e) => {
                info!(event, error = %e, "received message with unreadable 'timestamp'");
                return Ok(dropped(RouterError::Malformed(e.to_string())));
            }
        };

        match self.clocks.check(event, timestamp) {
            Verdict::Accepted => {}
            Verdict::Untracked => {
                warn!(event, "received event without corresponding handler registered");
                return Ok(dropped(RouterError::Unroutable {
                    event: event.to_string(),
                }));
            }
            Verdict::Stale { last_accepted } => {
                info!(event, %timestamp, %last_accepted, "ignoring not synchronised event");
                return Ok(dropped(RouterError::Stale {
                    event: event.to_string(),
                    received: timestamp,
                    last_accepted,
                }));
            }
        }

        // Clock exists but the handler is gone: unregistered mid-flight.
        let Some(handler) = self.handlers.get(event) else {
            warn!(event, "received event without corresponding handler registered");
            return Ok(dropped(RouterError::Unroutable {
                event: event.to_string(),
            }));
        };

        handler.handle(envelope.data_or_empty()).await?;
        Ok(DispatchOutcome::Handled)
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn dropped(reason: RouterError) -> DispatchOutcome {
    DispatchOutcome::Dropped(reason)
}
