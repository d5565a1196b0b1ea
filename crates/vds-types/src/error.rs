use thiserror::Error;

/// Errors produced while parsing identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("malformed address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: &'static str },
}
