use std::io;
use std::str::Utf8Error;

use thiserror::Error;
use tokio::time::error::Elapsed;

/// Everything that can go wrong while querying a game server.
///
/// Only [QueryError::Network] and [QueryError::Timeout] are worth retrying;
/// see [QueryError::is_transient].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// Host unreachable, name resolution failed, socket errors.
    #[error("network error: {0}")]
    Network(String),
    /// No response within the configured budget.
    #[error("timed out: {0}")]
    Timeout(String),
    /// Malformed, truncated or unexpectedly-shaped response.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// No handler registered for the requested game identifier.
    #[error("unsupported game: {0}")]
    UnsupportedGame(String),
}

impl QueryError {
    /// Packet loss and unreachable hosts may clear up on another attempt,
    /// a response we can't parse won't.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueryError::Network(_) | QueryError::Timeout(_))
    }
}

impl From<Elapsed> for QueryError {
    fn from(_: Elapsed) -> Self {
        QueryError::Timeout("no response within the query timeout".to_owned())
    }
}

impl From<Utf8Error> for QueryError {
    fn from(e: Utf8Error) -> Self {
        QueryError::Protocol(format!("invalid utf-8 in string field: {e}"))
    }
}

/// `byteorder` reports short reads as [io::ErrorKind::UnexpectedEof].
impl From<io::Error> for QueryError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::UnexpectedEof => QueryError::Protocol("response truncated".to_owned()),
            _ => QueryError::Network(e.to_string()),
        }
    }
}
