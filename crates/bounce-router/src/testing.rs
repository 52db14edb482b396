//! In-memory participants for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bounce_core::ConnectionId;
use serde_json::{json, Value};

use crate::connection::{Connection, ConnectionArena, ConnectionSet};
use crate::error::{Result, RouterError};
use crate::handler::Handler;
use crate::registry::Participant;
use crate::sender::Sender;

/// Connection that keeps every frame it is asked to write.
pub struct RecordingConnection {
    id: ConnectionId,
    frames: Mutex<Vec<String>>,
    fail: AtomicBool,
}

impl RecordingConnection {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            frames: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        })
    }

    pub fn failing(id: &str) -> Arc<Self> {
        let conn = Self::new(id);
        conn.fail.store(true, Ordering::SeqCst);
        conn
    }

    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RouterError::delivery(&self.id, "remote end closed"));
        }
        self.frames.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Connection whose writes never complete, like a peer that stopped reading.
pub struct StalledConnection {
    id: ConnectionId,
}

impl StalledConnection {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self { id: id.into() })
    }
}

#[async_trait]
impl Connection for StalledConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send_text(&self, _text: &str) -> Result<()> {
        std::future::pending().await
    }
}

/// Sender with a fixed `{"n": 1}` payload.
pub struct StaticSender {
    event: String,
    connections: ConnectionSet,
    period: Option<Duration>,
    fail_payload: bool,
    panic_payload: bool,
    sends: AtomicUsize,
}

impl StaticSender {
    pub fn new(event: &str, arena: Arc<ConnectionArena>) -> Self {
        Self {
            event: event.to_string(),
            connections: ConnectionSet::new(arena),
            period: None,
            fail_payload: false,
            panic_payload: false,
            sends: AtomicUsize::new(0),
        }
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = Some(period);
        self
    }

    pub fn with_failing_payload(mut self) -> Self {
        self.fail_payload = true;
        self
    }

    pub fn with_panicking_payload(mut self) -> Self {
        self.panic_payload = true;
        self
    }

    /// Number of payloads produced (attempted broadcasts).
    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

impl Participant for StaticSender {
    fn event_name(&self) -> &str {
        &self.event
    }
}

#[async_trait]
impl Sender for StaticSender {
    async fn produce_payload(&self) -> Result<Value> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        if self.panic_payload {
            panic!("payload producer crashed");
        }
        if self.fail_payload {
            return Err(RouterError::payload(&self.event, "state unavailable"));
        }
        Ok(json!({"n": 1}))
    }

    fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    fn period(&self) -> Option<Duration> {
        self.period
    }
}

/// Handler that remembers every payload.
pub struct RecordingHandler {
    event: String,
    received: Mutex<Vec<Value>>,
    coupled: Option<Arc<dyn Sender>>,
    fail: bool,
}

impl RecordingHandler {
    pub fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            received: Mutex::new(Vec::new()),
            coupled: None,
            fail: false,
        }
    }

    pub fn coupled_to(mut self, sender: Arc<dyn Sender>) -> Self {
        self.coupled = Some(sender);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

impl Participant for RecordingHandler {
    fn event_name(&self) -> &str {
        &self.event
    }
}

#[async_trait]
impl Handler for RecordingHandler {
    async fn process_data(&self, data: Value) -> Result<()> {
        self.received.lock().unwrap().push(data);
        if self.fail {
            return Err(RouterError::processing(&self.event, "boom"));
        }
        Ok(())
    }

    fn coupled_sender(&self) -> Option<Arc<dyn Sender>> {
        self.coupled.clone()
    }
}
