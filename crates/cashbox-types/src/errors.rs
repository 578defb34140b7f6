//! # Error Types
//!
//! Errors raised by business components. Every protocol in the hosting layer
//! maps these to its own status representation.

use thiserror::Error;

/// Errors returned by a business interface operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The operation name is not part of the hosted interface.
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// The request payload could not be decoded or is semantically invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The component exists but is not able to serve right now.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The business operation failed.
    #[error("Operation failed: {0}")]
    Failed(String),
}

impl ServiceError {
    /// Decoding failure of an incoming payload.
    pub fn invalid(err: impl std::fmt::Display) -> Self {
        Self::InvalidRequest(err.to_string())
    }

    /// Whether the caller is at fault.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::UnknownOperation(_) | Self::InvalidRequest(_))
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(err)
    }
}
