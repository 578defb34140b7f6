//! # Relayed Log Records
//!
//! A worker forwards its structured log events to the supervisor as
//! `LogRecord`s. Everything needed to re-emit the event faithfully travels
//! with it: original timestamp, level, template, exception and properties.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LogLevel;

/// One structured log entry as captured in a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// When the event was emitted in the worker (UTC).
    pub timestamp: DateTime<Utc>,
    /// Severity.
    pub level: LogLevel,
    /// Emitting module path.
    #[serde(default)]
    pub target: String,
    /// The message before field substitution.
    pub message_template: String,
    /// The message as rendered in the worker.
    pub rendered_message: String,
    /// Error text attached to the event, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Structured fields of the event.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            timestamp: Utc::now(),
            level,
            target: String::new(),
            message_template: message.clone(),
            rendered_message: message,
            exception: None,
            properties: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_preserves_timestamp_and_exception() {
        let mut record = LogRecord::new(LogLevel::Error, "Receipt {receipt} rejected")
            .with_property("receipt", 42);
        record.rendered_message = "Receipt 42 rejected".into();
        record.exception = Some("signature device offline".into());

        let json = serde_json::to_string(&record).unwrap();
        let back: LogRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(back, record);
        assert_eq!(back.timestamp, record.timestamp);
        assert_eq!(back.properties["receipt"], 42);
    }
}
