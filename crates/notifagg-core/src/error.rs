//! Error types for key and event parsing

use thiserror::Error;

/// Errors produced while decoding bucket keys or event types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    /// Encoded key does not have the expected number of fields
    #[error("malformed bucket key '{key}': expected {expected} fields, found {found}")]
    MalformedKey {
        key: String,
        expected: usize,
        found: usize,
    },

    /// Event type is not part of the supported set
    #[error("unknown event type '{0}' (supported: LIKE, COMMENT, SHARE)")]
    UnknownEventType(String),

    /// Window segment is not a valid unsigned integer
    #[error("invalid window id '{0}' in bucket key")]
    InvalidWindow(String),

    /// A `%` escape sequence in a field was not recognised
    #[error("invalid escape sequence in bucket key field '{0}'")]
    InvalidEscape(String),
}
