//! Server error types.

use thiserror::Error;

use crate::message::Message;

/// Rejection kinds produced by connection admission. Each is terminal for
/// the attempt: the peer receives one frame naming the kind, then a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// `key`, `id`, or `token` missing from the connection query string.
    #[error("INVALID_WS_PARAMETERS")]
    InvalidWsParameters,

    /// Supplied key does not match the configured shared key.
    #[error("INVALID_KEY")]
    InvalidKey,

    /// Registry is at the configured concurrency limit.
    #[error("CONNECTION_LIMIT_EXCEED")]
    ConnectionLimitExceed,

    /// Requested id already has a live connection and override is disabled.
    #[error("ID is taken")]
    IdTaken,
}

impl AdmissionError {
    /// The wire frame delivered to the rejected peer before the close.
    pub fn to_message(self) -> Message {
        match self {
            AdmissionError::IdTaken => Message::id_taken(),
            other => Message::error(&other.to_string()),
        }
    }
}

/// Process-level failures: only configuration loading and listener setup
/// propagate this far. Everything connection-scoped is resolved at the
/// gateway or router.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("config error: {0}")]
    Config(#[from] figment::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
