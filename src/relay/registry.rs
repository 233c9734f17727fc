//! Process-wide registry of live relay connections.
//!
//! Entries are added when a client socket is accepted and removed when its
//! relay closes. Reconnect and fallback paths consult [`ConnectionRegistry::is_live`]
//! before opening a new upstream session, so a connection that has gone away
//! never gets one.

use std::fmt;
use std::time::Instant;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::realtime::RealtimeProvider;

/// Unique id of one accepted client socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bookkeeping for one connection.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub opened_at: Instant,
    pub provider: Option<RealtimeProvider>,
    pub model: Option<String>,
}

/// Snapshot of a registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub provider: Option<RealtimeProvider>,
    pub model: Option<String>,
    pub age_secs: u64,
}

/// Registry of live connections, owned by the server state.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    entries: DashMap<ConnectionId, ConnectionEntry>,
    shutdown: CancellationToken,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. The returned token fires on server shutdown.
    pub fn register(&self, id: ConnectionId) -> CancellationToken {
        self.entries.insert(
            id,
            ConnectionEntry {
                opened_at: Instant::now(),
                provider: None,
                model: None,
            },
        );
        debug!(connection_id = %id, active = self.entries.len(), "Connection registered");
        self.shutdown.child_token()
    }

    /// Record the provider and model a connection is using.
    pub fn bind(&self, id: ConnectionId, provider: RealtimeProvider, model: &str) {
        if let Some(mut entry) = self.entries.get_mut(&id) {
            entry.provider = Some(provider);
            entry.model = Some(model.to_string());
        }
    }

    /// Remove a connection. Returns whether it was present.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            debug!(connection_id = %id, active = self.entries.len(), "Connection removed");
        }
        removed
    }

    pub fn is_live(&self, id: ConnectionId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.entries.get(&id).map(|entry| ConnectionInfo {
            id,
            provider: entry.provider,
            model: entry.model.clone(),
            age_secs: entry.opened_at.elapsed().as_secs(),
        })
    }

    /// Ask every live connection to close. New registrations are cancelled
    /// immediately.
    pub fn shutdown_all(&self) {
        info!(active = self.entries.len(), "Closing all relay connections");
        self.shutdown.cancel();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
