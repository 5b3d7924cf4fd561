//! Error types for session values and the registry

use thiserror::Error;

use crate::SessionId;

/// Errors surfaced synchronously by session operations.
///
/// A missing entry is not an error: lookups and updates report absence
/// through `None` / `false` instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transform changed session id from {expected} to {found}")]
    IdMismatch { expected: SessionId, found: SessionId },
}

impl SessionError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}
