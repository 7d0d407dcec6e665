//! Injected key-value persistence for session metadata
//!
//! The streaming core holds no persistence logic of its own; it writes the
//! committed identity through this trait (keyed by agent id) and removes it
//! on an explicit conversation reset.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted session metadata for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
}

/// External key-value store, injected into the client.
///
/// Implementations own their failure handling; a store that cannot persist
/// should log and carry on rather than fail the turn.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Option<SessionRecord>;
    async fn set(&self, key: &str, record: SessionRecord);
    async fn remove(&self, key: &str);
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Option<SessionRecord> {
        self.entries.lock().get(key).cloned()
    }

    async fn set(&self, key: &str, record: SessionRecord) {
        self.entries.lock().insert(key.to_string(), record);
    }

    async fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}
