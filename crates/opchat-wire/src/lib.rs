//! opchat-wire: wire protocol layer for the assistant response stream
//!
//! This crate owns the framing and event vocabulary of the streaming chat
//! endpoint: line-framed `data:`-prefixed JSON records, decoded into typed
//! [`StreamEvent`]s, plus the shape matchers that pull a text fragment out
//! of a delta payload.

pub mod decoder;
pub mod event;

pub use decoder::{DATA_PREFIX, FrameDecoder};
pub use event::{StreamEvent, delta_fragment};
