//! # Command-line Hand-off Encoding
//!
//! Configurations cross the process boundary as command-line arguments. They
//! are serialized to JSON and base64-encoded so no shell or platform quoting
//! rule can mangle them.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors while encoding or decoding a hand-off argument.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error("argument is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("argument is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serialize `value` to base64-encoded JSON.
pub fn encode_argument<T: Serialize>(value: &T) -> Result<String, InvocationError> {
    let json = serde_json::to_vec(value)?;
    Ok(STANDARD.encode(json))
}

/// Decode a base64-encoded JSON argument.
pub fn decode_argument<T: DeserializeOwned>(argument: &str) -> Result<T, InvocationError> {
    let json = STANDARD.decode(argument.trim())?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ComponentConfiguration, ComponentKind, PlebeianConfiguration};
    use uuid::Uuid;

    #[test]
    fn test_encoded_argument_has_no_shell_metacharacters() {
        let config = PlebeianConfiguration {
            component: ComponentConfiguration::new(Uuid::new_v4(), "InMemory.Queue", "1.0.0")
                .with_url("rest://localhost:1503/pos \"quoted\" & more"),
            kind: ComponentKind::Queue,
        };

        let encoded = encode_argument(&config).unwrap();
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')));

        let decoded: PlebeianConfiguration = decode_argument(&encoded).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result: Result<PlebeianConfiguration, _> = decode_argument("not base64!!");
        assert!(matches!(result, Err(InvocationError::Base64(_))));

        let not_json = STANDARD.encode(b"{ nope");
        let result: Result<PlebeianConfiguration, _> = decode_argument(&not_json);
        assert!(matches!(result, Err(InvocationError::Json(_))));
    }
}
