//! Core error model.

use thiserror::Error;

/// Result type used by the core value types.
pub type CoreResult<T> = Result<T, CoreError>;

/// Failures while constructing core values from untrusted input.
///
/// Transport and remote-dependency failures live in the crates that own those
/// concerns; this enum only covers framing and identifier validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A namespace identifier failed syntactic validation.
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    /// A request body could not be read as a payload batch.
    #[error("malformed payload batch: {0}")]
    MalformedBatch(String),
}

impl CoreError {
    pub fn invalid_namespace(msg: impl Into<String>) -> Self {
        Self::InvalidNamespace(msg.into())
    }

    pub fn malformed_batch(msg: impl Into<String>) -> Self {
        Self::MalformedBatch(msg.into())
    }
}
