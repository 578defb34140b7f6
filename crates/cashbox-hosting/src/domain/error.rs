//! Hosting error types and the JSON-RPC error code table.
//!
//! Business errors (`ServiceError`) are mapped here onto every protocol's
//! status representation: JSON-RPC error objects, HTTP status codes and
//! gRPC `Status`.

use std::fmt;
use std::net::SocketAddr;

use axum::http::StatusCode;
use cashbox_types::ServiceError;
use serde::{Deserialize, Serialize};

/// Error codes shared by the document-RPC and REST error bodies.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;

    pub const BUSINESS_FAILURE: i32 = -32000;
    pub const COMPONENT_UNAVAILABLE: i32 = -32002;
    pub const TIMEOUT: i32 = -32006;
}

/// Error body of the document-RPC and REST surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Body was not JSON at all.
    pub fn parse_error(details: impl fmt::Display) -> Self {
        Self::new(codes::PARSE_ERROR, format!("unreadable document: {details}"))
    }

    /// Envelope is malformed (missing method, bad id, empty batch).
    pub fn invalid_request(details: impl fmt::Display) -> Self {
        Self::new(codes::INVALID_REQUEST, format!("malformed envelope: {details}"))
    }

    pub fn method_not_found(operation: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            format!("operation '{operation}' is not offered by this component"),
        )
    }

    /// Payload is JSON but does not fit the operation's request type.
    pub fn invalid_params(details: impl fmt::Display) -> Self {
        Self::new(codes::INVALID_PARAMS, format!("invalid payload: {details}"))
    }

    /// The business call did not answer within the request timeout.
    pub fn timeout(operation: impl fmt::Display) -> Self {
        Self::new(codes::TIMEOUT, format!("'{operation}' timed out"))
    }

    /// HTTP status used when this error is the whole response.
    pub fn http_status(&self) -> StatusCode {
        match self.code {
            codes::PARSE_ERROR | codes::INVALID_REQUEST | codes::INVALID_PARAMS => {
                StatusCode::BAD_REQUEST
            }
            codes::METHOD_NOT_FOUND => StatusCode::NOT_FOUND,
            codes::COMPONENT_UNAVAILABLE => StatusCode::SERVICE_UNAVAILABLE,
            codes::TIMEOUT => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        if e.is_syntax() || e.is_eof() {
            ApiError::parse_error(e)
        } else {
            ApiError::invalid_params(e)
        }
    }
}

impl From<&ServiceError> for ApiError {
    fn from(e: &ServiceError) -> Self {
        match e {
            ServiceError::UnknownOperation(op) => ApiError::method_not_found(op),
            ServiceError::InvalidRequest(details) => ApiError::invalid_params(details),
            ServiceError::Unavailable(details) => {
                ApiError::new(codes::COMPONENT_UNAVAILABLE, details.clone())
            }
            ServiceError::Failed(details) => ApiError::new(codes::BUSINESS_FAILURE, details.clone()),
        }
    }
}

/// gRPC status for a business error.
pub fn grpc_status(e: &ServiceError) -> tonic::Status {
    match e {
        ServiceError::UnknownOperation(op) => tonic::Status::unimplemented(op.clone()),
        ServiceError::InvalidRequest(details) => tonic::Status::invalid_argument(details.clone()),
        ServiceError::Unavailable(details) => tonic::Status::unavailable(details.clone()),
        ServiceError::Failed(details) => tonic::Status::internal(details.clone()),
    }
}

/// Listener setup errors
#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    /// Bind URI could not be parsed
    #[error("invalid bind URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Scheme is not one of grpc, rest, http, https, net.tcp
    #[error("unsupported protocol '{scheme}' in bind URI '{uri}'")]
    UnsupportedProtocol { uri: String, scheme: String },

    /// REST hosting needs an endpoint binder
    #[error("no endpoint binder supplied for REST bind URI '{uri}'")]
    MissingEndpointBinder { uri: String },

    /// https:// requires TLS termination, which is not configured here
    #[error("TLS is not configured for bind URI '{uri}'")]
    TlsNotConfigured { uri: String },

    /// A binder registered a route for an operation the service lacks
    #[error("invalid route: {0}")]
    InvalidRoute(String),

    /// Server socket bind error
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_operation_is_not_found() {
        let err = ApiError::from(&ServiceError::UnknownOperation("Refund".into()));
        assert_eq!(err.code, codes::METHOD_NOT_FOUND);
        assert!(err.message.contains("Refund"));
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_body_omits_empty_data() {
        let body = serde_json::to_value(ApiError::invalid_params("missing 'Message'")).unwrap();
        assert_eq!(body["code"], codes::INVALID_PARAMS);
        assert!(body.get("data").is_none());
    }

    #[test]
    fn test_json_errors_split_by_kind() {
        let syntax = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert_eq!(ApiError::from(syntax).code, codes::PARSE_ERROR);

        let shape = serde_json::from_str::<Vec<u8>>("{}").unwrap_err();
        assert_eq!(ApiError::from(shape).code, codes::INVALID_PARAMS);
    }

    #[test]
    fn test_business_error_mapping() {
        let unavailable = ServiceError::Unavailable("TSE not connected".into());
        let api = ApiError::from(&unavailable);
        assert_eq!(api.code, codes::COMPONENT_UNAVAILABLE);
        assert_eq!(api.message, "TSE not connected");
        assert_eq!(api.http_status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(grpc_status(&unavailable).code(), tonic::Code::Unavailable);

        let invalid = ServiceError::InvalidRequest("bad".into());
        assert_eq!(grpc_status(&invalid).code(), tonic::Code::InvalidArgument);
        assert_eq!(ApiError::from(&invalid).http_status(), StatusCode::BAD_REQUEST);

        let failed = ServiceError::Failed("journal full".into());
        assert_eq!(ApiError::from(&failed).http_status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
