//! The bundled ping demo: an on-demand `ping` sender, a periodic
//! `ping_timed` sender and a `ping` handler that answers through the former.

use async_trait::async_trait;
use bounce_core::config::DemoConfig;
use bounce_router::{
    framerate_period, ConnectionArena, ConnectionSet, Dispatcher, Handler, Participant, Sender,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub const PING_EVENT: &str = "ping";
pub const TIMED_PING_EVENT: &str = "ping_timed";

fn ping_payload() -> Value {
    json!({ "ping": "ping" })
}

pub struct PingSender {
    connections: ConnectionSet,
}

impl PingSender {
    pub fn new(arena: Arc<ConnectionArena>) -> Self {
        Self {
            connections: ConnectionSet::new(arena),
        }
    }
}

impl Participant for PingSender {
    fn event_name(&self) -> &str {
        PING_EVENT
    }
}

#[async_trait]
impl Sender for PingSender {
    async fn produce_payload(&self) -> bounce_router::Result<Value> {
        Ok(ping_payload())
    }

    fn connections(&self) -> &ConnectionSet {
        &self.connections
    }
}

/// Same payload as [`PingSender`], broadcast `framerate` times per second.
pub struct TimedPingSender {
    connections: ConnectionSet,
    period: Option<Duration>,
}

impl TimedPingSender {
    pub fn new(arena: Arc<ConnectionArena>, framerate: f64) -> Self {
        let period = framerate_period(framerate);
        if period.is_none() {
            warn!(framerate, "invalid timed ping framerate; periodic broadcast disabled");
        }
        Self {
            connections: ConnectionSet::new(arena),
            period,
        }
    }
}

impl Participant for TimedPingSender {
    fn event_name(&self) -> &str {
        TIMED_PING_EVENT
    }
}

#[async_trait]
impl Sender for TimedPingSender {
    async fn produce_payload(&self) -> bounce_router::Result<Value> {
        Ok(ping_payload())
    }

    fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    fn period(&self) -> Option<Duration> {
        self.period
    }
}

pub struct PingHandler {
    reply: Arc<dyn Sender>,
}

impl PingHandler {
    pub fn new(reply: Arc<dyn Sender>) -> Self {
        Self { reply }
    }
}

impl Participant for PingHandler {
    fn event_name(&self) -> &str {
        PING_EVENT
    }
}

#[async_trait]
impl Handler for PingHandler {
    async fn process_data(&self, _data: Value) -> bounce_router::Result<()> {
        info!("received ping message");
        Ok(())
    }

    fn coupled_sender(&self) -> Option<Arc<dyn Sender>> {
        Some(Arc::clone(&self.reply))
    }
}

/// Register the demo participants with `dispatcher`.
pub fn install(dispatcher: &Dispatcher, config: &DemoConfig) -> bounce_router::Result<()> {
    let arena = Arc::clone(dispatcher.arena());
    let ping: Arc<dyn Sender> = Arc::new(PingSender::new(Arc::clone(&arena)));
    let timed: Arc<dyn Sender> =
        Arc::new(TimedPingSender::new(arena, config.timed_ping_framerate));

    dispatcher.register_sender(Arc::clone(&ping))?;
    dispatcher.register_sender(timed)?;
    dispatcher.register_handler(Arc::new(PingHandler::new(ping)))?;
    Ok(())
}
