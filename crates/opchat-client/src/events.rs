//! Client event types

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Events emitted over the client's broadcast channel during a turn.
///
/// `Error` is the caller-facing failure surface; a caller-issued `cancel()`
/// produces `Cancelled`, never `Error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A turn was accepted and its network call is being opened
    TurnStart,
    /// A delta fragment arrived and was appended to the accumulator
    Delta { fragment: String },
    /// The assistant turn was frozen and appended to history
    MessageCommitted { message: Message },
    /// The turn finished normally
    TurnEnd,
    /// The turn was cancelled by the caller; a normal exit
    Cancelled,
    /// The turn failed; carries the transport or server-reported message
    Error { message: String },
}

impl ChatEvent {
    /// Check if this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ChatEvent::TurnEnd | ChatEvent::Cancelled | ChatEvent::Error { .. }
        )
    }
}
