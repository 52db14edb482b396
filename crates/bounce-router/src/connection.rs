use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bounce_core::ConnectionId;
use dashmap::DashMap;
use tracing::debug;

use crate::error::Result;

/// A live channel to one remote peer, owned by the transport.
///
/// `send_text` takes `&self` so a broadcast and the connection's own receive
/// loop can both hold the handle; implementations serialize writes internally.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> &ConnectionId;

    /// Write one text frame. An error means only this peer missed the frame.
    async fn send_text(&self, text: &str) -> Result<()>;
}

/// Every live connection, addressed by id.
///
/// Senders keep ids, never handles; this is the only place a handle lives
/// between accept and disconnect.
pub struct ConnectionArena {
    connections: DashMap<ConnectionId, Arc<dyn Connection>>,
}

impl ConnectionArena {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Insert a handle under its own id. Replaces a previous handle with the same id.
    pub fn insert(&self, connection: Arc<dyn Connection>) -> ConnectionId {
        let id = connection.id().clone();
        if self.connections.insert(id.clone(), connection).is_some() {
            debug!(conn_id = %id, "connection handle replaced");
        }
        id
    }

    pub fn remove(&self, id: &ConnectionId) -> Option<Arc<dyn Connection>> {
        self.connections.remove(id).map(|(_, conn)| conn)
    }

    /// Clone the handle out so no shard lock is held across a write.
    pub fn get(&self, id: &ConnectionId) -> Option<Arc<dyn Connection>> {
        self.connections.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for ConnectionArena {
    fn default() -> Self {
        Self::new()
    }
}

/// The ids one sender broadcasts to, resolved against a shared arena.
///
/// Membership is per sender: the same id may sit in any number of sets.
pub struct ConnectionSet {
    arena: Arc<ConnectionArena>,
    members: RwLock<HashSet<ConnectionId>>,
}

impl ConnectionSet {
    pub fn new(arena: Arc<ConnectionArena>) -> Self {
        Self {
            arena,
            members: RwLock::new(HashSet::new()),
        }
    }

    /// Returns false if the id was already present.
    pub fn insert(&self, id: ConnectionId) -> bool {
        self.members
            .write()
            .expect("connection set poisoned")
            .insert(id)
    }

    /// Returns false if the id was not present.
    pub fn remove(&self, id: &ConnectionId) -> bool {
        self.members
            .write()
            .expect("connection set poisoned")
            .remove(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members
            .read()
            .expect("connection set poisoned")
            .contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.read().expect("connection set poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Point-in-time copy of the member ids. Ids added or removed after this
    /// call are not reflected.
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        self.members
            .read()
            .expect("connection set poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Snapshot resolved to live handles. Ids whose handle already left the
    /// arena (disconnect in progress) are skipped.
    pub fn resolve(&self) -> Vec<Arc<dyn Connection>> {
        self.snapshot()
            .iter()
            .filter_map(|id| self.arena.get(id))
            .collect()
    }

    pub fn arena(&self) -> &Arc<ConnectionArena> {
        &self.arena
    }
}
