//! File-backed session persistence
//!
//! Keeps one JSON map of agent id to session record under the user config
//! directory, so a conversation survives across invocations. Persistence
//! failures are logged and swallowed; losing a session record costs a fresh
//! thread, never a failed turn.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use opchat_client::{SessionRecord, SessionStore};

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store under the platform config directory (`opchat/sessions.json`).
    pub fn open_default() -> Option<Self> {
        let dir = dirs::config_dir()?.join("opchat");
        Some(Self {
            path: dir.join("sessions.json"),
        })
    }

    #[cfg(test)]
    fn at(path: PathBuf) -> Self {
        Self { path }
    }

    fn load(&self) -> HashMap<String, SessionRecord> {
        let Ok(raw) = std::fs::read_to_string(&self.path) else {
            return HashMap::new();
        };
        match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("ignoring unreadable session file: {e}");
                HashMap::new()
            }
        }
    }

    fn save(&self, map: &HashMap<String, SessionRecord>) {
        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let raw = serde_json::to_string_pretty(map)?;
            std::fs::write(&self.path, raw)
        };
        if let Err(e) = write() {
            tracing::warn!("failed to persist sessions: {e}");
        }
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn get(&self, key: &str) -> Option<SessionRecord> {
        self.load().remove(key)
    }

    async fn set(&self, key: &str, record: SessionRecord) {
        let mut map = self.load();
        map.insert(key.to_string(), record);
        self.save(&map);
    }

    async fn remove(&self, key: &str) {
        let mut map = self.load();
        if map.remove(key).is_some() {
            self.save(&map);
        }
    }
}
