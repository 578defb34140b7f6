//! # Cashbox Telemetry
//!
//! Logging for the supervisor and its workers.
//!
//! ## Components
//!
//! - **Subscriber setup**: `EnvFilter`, console output and a daily rolling
//!   file per process
//! - **Relay layer**: captures worker events for forwarding to the supervisor
//! - **Log sink**: re-emits relayed records inside the supervisor
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cashbox_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_launcher(&launcher_config, "launcher");
//! let _guard = init_logging(&config, None)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | configured level | Filter directives |
//! | `CASHBOX_CONSOLE_OUTPUT` | `true` | Console output |
//! | `CASHBOX_JSON_LOGS` | `false` | JSON console output |

mod config;
mod logging;
mod relay;
mod sink;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging, LoggingGuard};
pub use relay::{log_level_of, RelayLayer, RelayReceiver};
pub use sink::{LogSink, MemoryLogSink, TracingLogSink, RELAY_TARGET};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    Init(String),

    #[error("Failed to prepare log folder: {0}")]
    Io(#[from] std::io::Error),
}
