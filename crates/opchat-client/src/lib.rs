//! opchat-client: streaming chat client for the assistant backend
//!
//! This crate turns the byte stream decoded by `opchat-wire` into a live,
//! cancellable conversation turn: it owns the single-flight lifecycle, the
//! turn-in-progress text buffers, the paced on-screen reveal, and the
//! backend-assigned session/thread identity.

pub mod accumulator;
pub mod client;
pub mod error;
pub mod events;
pub mod identity;
pub mod message;
pub mod reveal;
pub mod store;
pub mod transport;

pub use accumulator::TurnAccumulator;
pub use client::{ChatClient, ChatConfig};
pub use error::{Error, Result};
pub use events::ChatEvent;
pub use identity::{Identity, IdentityCell};
pub use message::{Message, Role};
pub use reveal::RevealConfig;
pub use store::{MemoryStore, SessionRecord, SessionStore};
pub use transport::{ByteStream, Environment, HttpTransport, Transport, TurnRequest};
