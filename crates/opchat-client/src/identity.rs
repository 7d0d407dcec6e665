//! Session/thread identity shared across turns
//!
//! The backend mints `threadId`/`userId` during the first turn; every later
//! request on the same conversation must carry them. Because a turn is a
//! long-running async flow, identity is read through this shared cell at
//! the moment each request is built — never from a value captured when the
//! flow started.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The externally assigned conversation identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub thread_id: Option<String>,
    pub user_id: Option<String>,
}

/// Mutable cell holding the latest committed identity.
///
/// Commits are monotonic: ids are only ever set, never cleared, except by
/// the explicit new-conversation [`IdentityCell::clear`].
#[derive(Clone, Default)]
pub struct IdentityCell {
    inner: Arc<Mutex<Identity>>,
}

impl IdentityCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current identity (for building an outgoing request).
    pub fn snapshot(&self) -> Identity {
        self.inner.lock().clone()
    }

    pub fn thread_id(&self) -> Option<String> {
        self.inner.lock().thread_id.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.lock().user_id.clone()
    }

    /// Commit a backend-assigned user id.
    pub fn commit_user(&self, user_id: impl Into<String>) {
        self.inner.lock().user_id = Some(user_id.into());
    }

    /// Commit a backend-assigned thread id, and the user id when present.
    pub fn commit_thread(&self, thread_id: impl Into<String>, user_id: Option<String>) {
        let mut identity = self.inner.lock();
        identity.thread_id = Some(thread_id.into());
        if user_id.is_some() {
            identity.user_id = user_id;
        }
    }

    /// Restore a persisted identity. Present ids win; absent ones never
    /// erase an already committed value.
    pub fn restore(&self, record: Identity) {
        let mut identity = self.inner.lock();
        if record.thread_id.is_some() {
            identity.thread_id = record.thread_id;
        }
        if record.user_id.is_some() {
            identity.user_id = record.user_id;
        }
    }

    /// Explicit new-conversation reset; the only way ids are ever cleared.
    pub fn clear(&self) {
        *self.inner.lock() = Identity::default();
    }
}
