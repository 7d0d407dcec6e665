//! Conversation history types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A finalized message in the conversation history.
///
/// History is append-only: once a message is pushed it is never mutated.
/// The in-progress assistant turn lives in the accumulator, outside the
/// history, until it is committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned id when the backend reported one, local uuid otherwise
    pub id: String,
    pub role: Role,
    pub content: String,
    /// Timestamp of finalization
    pub created_at: DateTime<Utc>,
    /// Backend run correlation id, attached to assistant messages on completion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl Message {
    /// Create a user message with a locally assigned id.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            created_at: Utc::now(),
            run_id: None,
        }
    }

    /// Create a finalized assistant message, preferring the server ids.
    pub fn assistant(content: String, id: Option<String>, run_id: Option<String>) -> Self {
        Self {
            id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            role: Role::Assistant,
            content,
            created_at: Utc::now(),
            run_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_gets_local_id() {
        let a = Message::user("hi");
        let b = Message::user("hi");
        assert_eq!(a.role, Role::User);
        assert_ne!(a.id, b.id);
        assert!(a.run_id.is_none());
    }

    #[test]
    fn test_assistant_message_prefers_server_id() {
        let msg = Message::assistant("Hello".into(), Some("m1".into()), Some("r1".into()));
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.run_id.as_deref(), Some("r1"));
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn test_assistant_message_falls_back_to_local_id() {
        let msg = Message::assistant("Hello".into(), None, None);
        assert!(!msg.id.is_empty());
    }
}
