//! # Control Plane Errors

use thiserror::Error;
use uuid::Uuid;

/// Errors on either side of the control plane.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// Socket or pipe failure.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// The peer closed the connection.
    #[error("Connection closed by peer")]
    ConnectionClosed,

    /// Frame exceeds the maximum length.
    #[error("Frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },

    /// Payload is not a valid message.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No response within the call timeout.
    #[error("Call timed out")]
    Timeout,

    /// `ReportStarted` named a component the supervisor does not know.
    #[error("Unknown component: {0}")]
    UnknownComponent(Uuid),

    /// The supervisor rejected the call.
    #[error("Remote error: {0}")]
    Remote(String),
}

impl From<serde_json::Error> for ControlPlaneError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(err.to_string())
    }
}
