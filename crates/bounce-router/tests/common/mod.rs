use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bounce_core::ConnectionId;
use bounce_router::{
    Connection, ConnectionArena, ConnectionSet, Handler, Participant, Result, Sender,
};
use serde_json::{json, Value};

pub struct MemoryConnection {
    id: ConnectionId,
    frames: Mutex<Vec<String>>,
}

impl MemoryConnection {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            frames: Mutex::new(Vec::new()),
        })
    }

    pub fn frames(&self) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .map(|f| serde_json::from_str(f).unwrap())
            .collect()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.frames.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

pub struct PongSender {
    connections: ConnectionSet,
}

impl PongSender {
    pub fn new(arena: Arc<ConnectionArena>) -> Self {
        Self {
            connections: ConnectionSet::new(arena),
        }
    }
}

impl Participant for PongSender {
    fn event_name(&self) -> &str {
        "pong"
    }
}

#[async_trait]
impl Sender for PongSender {
    async fn produce_payload(&self) -> Result<Value> {
        Ok(json!({"pong": "pong"}))
    }

    fn connections(&self) -> &ConnectionSet {
        &self.connections
    }
}

pub struct PingHandler {
    pub seen: Mutex<Vec<Value>>,
    reply: Arc<dyn Sender>,
}

impl PingHandler {
    pub fn new(reply: Arc<dyn Sender>) -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            reply,
        }
    }
}

impl Participant for PingHandler {
    fn event_name(&self) -> &str {
        "ping"
    }
}

#[async_trait]
impl Handler for PingHandler {
    async fn process_data(&self, data: Value) -> Result<()> {
        self.seen.lock().unwrap().push(data);
        Ok(())
    }

    fn coupled_sender(&self) -> Option<Arc<dyn Sender>> {
        Some(Arc::clone(&self.reply))
    }
}
