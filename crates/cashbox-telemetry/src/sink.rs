//! Supervisor-side log sink for relayed records.

use std::collections::BTreeMap;

use cashbox_types::{LogLevel, LogRecord};
use parking_lot::Mutex;

/// Target under which relayed records are re-emitted.
pub const RELAY_TARGET: &str = "cashbox::relay";

/// Destination of relayed worker records.
///
/// Implementations receive records one at a time; the control-plane server
/// serialises calls so a sink never sees two writes interleave.
pub trait LogSink: Send + Sync {
    fn write(&self, record: &LogRecord, tags: &BTreeMap<String, String>);
}

/// Re-emits relayed records through the supervisor's own subscriber.
///
/// The worker's original timestamp, template, exception and properties are
/// attached as fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

macro_rules! emit {
    ($level:ident, $record:expr, $tags:expr, $properties:expr) => {
        tracing::$level!(
            target: "cashbox::relay",
            component_id = $tags.get("component_id").map(String::as_str).unwrap_or("-"),
            package = $tags.get("package").map(String::as_str).unwrap_or("-"),
            worker_target = %$record.target,
            worker_timestamp = %$record.timestamp.to_rfc3339(),
            template = %$record.message_template,
            exception = $record.exception.as_deref().unwrap_or(""),
            properties = %$properties,
            "{}",
            $record.rendered_message
        )
    };
}

impl LogSink for TracingLogSink {
    fn write(&self, record: &LogRecord, tags: &BTreeMap<String, String>) {
        let properties = serde_json::to_string(&record.properties).unwrap_or_default();
        match record.level {
            LogLevel::Trace => emit!(trace, record, tags, properties),
            LogLevel::Debug => emit!(debug, record, tags, properties),
            LogLevel::Info => emit!(info, record, tags, properties),
            LogLevel::Warn => emit!(warn, record, tags, properties),
            LogLevel::Error => emit!(error, record, tags, properties),
        }
    }
}

/// Keeps every relayed record in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<(LogRecord, BTreeMap<String, String>)>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<(LogRecord, BTreeMap<String, String>)> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl LogSink for MemoryLogSink {
    fn write(&self, record: &LogRecord, tags: &BTreeMap<String, String>) {
        self.records.lock().push((record.clone(), tags.clone()));
    }
}
