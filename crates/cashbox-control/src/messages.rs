//! # Control Plane Messages
//!
//! Requests are sent by workers, responses by the supervisor. Each request
//! gets exactly one response on the same connection.

use std::collections::BTreeMap;

use cashbox_types::LogRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ControlPlaneError;

/// Worker-to-supervisor call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// The worker finished binding and is ready.
    ReportStarted { component_id: Uuid },

    /// Liveness check.
    Ping,

    /// One structured log record plus enrichment tags.
    RelayLog {
        record: LogRecord,
        tags: BTreeMap<String, String>,
    },
}

impl ControlRequest {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReportStarted { .. } => "ReportStarted",
            Self::Ping => "Ping",
            Self::RelayLog { .. } => "RelayLog",
        }
    }
}

/// Supervisor reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlResponse {
    Ok,
    Err {
        message: String,
        #[serde(default)]
        unknown_component: Option<Uuid>,
    },
}

impl ControlResponse {
    /// Build a reply from a handler result.
    pub fn from_result(result: Result<(), ControlPlaneError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(ControlPlaneError::UnknownComponent(id)) => Self::Err {
                message: format!("unknown component {id}"),
                unknown_component: Some(id),
            },
            Err(e) => Self::Err {
                message: e.to_string(),
                unknown_component: None,
            },
        }
    }

    /// Turn a reply back into a result on the calling side.
    pub fn into_result(self) -> Result<(), ControlPlaneError> {
        match self {
            Self::Ok => Ok(()),
            Self::Err {
                unknown_component: Some(id),
                ..
            } => Err(ControlPlaneError::UnknownComponent(id)),
            Self::Err { message, .. } => Err(ControlPlaneError::Remote(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_component_survives_the_wire() {
        let id = Uuid::new_v4();
        let response = ControlResponse::from_result(Err(ControlPlaneError::UnknownComponent(id)));

        let json = serde_json::to_string(&response).unwrap();
        let back: ControlResponse = serde_json::from_str(&json).unwrap();

        assert!(matches!(
            back.into_result(),
            Err(ControlPlaneError::UnknownComponent(got)) if got == id
        ));
    }

    #[test]
    fn test_request_is_externally_tagged() {
        let json = serde_json::to_value(ControlRequest::Ping).unwrap();
        assert_eq!(json, serde_json::json!("Ping"));

        let id = Uuid::nil();
        let json = serde_json::to_value(ControlRequest::ReportStarted { component_id: id }).unwrap();
        assert_eq!(json["ReportStarted"]["component_id"], id.to_string());
    }
}
