//! Worker-side log relay.
//!
//! `RelayLayer` turns every event into a `LogRecord` and hands it to a
//! bounded channel. A task owned by the worker drains the channel and
//! forwards records over the control plane. Events emitted by the control
//! plane itself are never captured, so the relay cannot feed itself.
//!
//! Records that do not fit in the channel are counted on the shared
//! [`RelayReceiver`]; the forwarder reports the count under [`RELAY_TARGET`].

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cashbox_types::{LogLevel, LogRecord};
use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::sink::RELAY_TARGET;

/// Targets whose events are never relayed.
const SKIPPED_TARGETS: &[&str] = &["cashbox_control", RELAY_TARGET];

/// Map a `tracing` level onto the relayed level.
pub fn log_level_of(level: &Level) -> LogLevel {
    match *level {
        Level::TRACE => LogLevel::Trace,
        Level::DEBUG => LogLevel::Debug,
        Level::INFO => LogLevel::Info,
        Level::WARN => LogLevel::Warn,
        Level::ERROR => LogLevel::Error,
    }
}

fn is_skipped(target: &str) -> bool {
    SKIPPED_TARGETS.iter().any(|skip| target.starts_with(skip))
}

/// Layer capturing events for relay to the supervisor.
#[derive(Clone)]
pub struct RelayLayer {
    sender: mpsc::Sender<LogRecord>,
    dropped: Arc<AtomicU64>,
}

impl RelayLayer {
    /// Create the layer together with the receiving end of its channel.
    ///
    /// When the channel is full, new records are dropped rather than
    /// blocking the emitting task.
    pub fn channel(capacity: usize) -> (Self, RelayReceiver) {
        let (sender, records) = mpsc::channel(capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));
        let layer = Self {
            sender,
            dropped: dropped.clone(),
        };
        (layer, RelayReceiver { records, dropped })
    }

    /// Records dropped and not yet reported.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enqueue(&self, record: LogRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            // Forwarder gone: the worker is shutting down.
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Receiving end of a [`RelayLayer`].
pub struct RelayReceiver {
    records: mpsc::Receiver<LogRecord>,
    dropped: Arc<AtomicU64>,
}

impl RelayReceiver {
    /// Next captured record; `None` once every layer clone is gone.
    pub async fn recv(&mut self) -> Option<LogRecord> {
        self.records.recv().await
    }

    pub fn try_recv(&mut self) -> Result<LogRecord, TryRecvError> {
        self.records.try_recv()
    }

    /// Number of records dropped since the last call, resetting it to zero.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}

impl<S: Subscriber> Layer<S> for RelayLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if is_skipped(metadata.target()) {
            return;
        }

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(log_level_of(metadata.level()), visitor.message.clone());
        record.target = metadata.target().to_string();
        record.rendered_message = visitor.rendered();
        record.exception = visitor.exception;
        record.properties = visitor.properties;

        self.enqueue(record);
    }
}

#[derive(Default)]
struct RecordVisitor {
    message: String,
    exception: Option<String>,
    properties: std::collections::BTreeMap<String, serde_json::Value>,
}

impl RecordVisitor {
    fn rendered(&self) -> String {
        let mut rendered = self.message.clone();
        for (key, value) in &self.properties {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            rendered.push_str(&format!(" {key}={value}"));
        }
        rendered
    }

    fn insert(&mut self, field: &Field, value: serde_json::Value) {
        match field.name() {
            "message" => {
                self.message = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                }
            }
            "error" | "exception" => {
                self.exception = Some(match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                })
            }
            name => {
                self.properties.insert(name.to_string(), value);
            }
        }
    }
}

impl Visit for RecordVisitor {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.exception = Some(value.to_string());
        if field.name() != "error" && field.name() != "exception" {
            self.properties
                .insert(field.name().to_string(), value.to_string().into());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, format!("{value:?}").into());
    }
}
