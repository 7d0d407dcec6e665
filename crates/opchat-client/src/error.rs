//! Error types for opchat-client

use thiserror::Error;

/// Result type alias using opchat-client Error
pub type Result<T> = std::result::Result<T, Error>;

/// Turn-ending failures surfaced to the caller.
///
/// Cancellation is represented by [`Error::Aborted`] internally but is a
/// normal exit, never reported through the error event.
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request or stream read failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status before streaming
    #[error("request failed with status {code}: {message}")]
    Status { code: u16, message: String },

    /// Server-reported error event; the message is passed through verbatim
    #[error("{0}")]
    Protocol(String),

    /// Turn was cancelled by the caller
    #[error("turn aborted")]
    Aborted,
}

impl Error {
    /// Whether this failure came from the caller's own `cancel()`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Aborted)
    }
}
