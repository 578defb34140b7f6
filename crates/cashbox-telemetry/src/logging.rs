//! Subscriber initialisation.
//!
//! Every process (supervisor and workers) installs the same stack:
//! - `EnvFilter` from `RUST_LOG`, falling back to the configured level
//! - Console output (pretty or JSON)
//! - Daily rolling file under the log folder
//! - The worker-only `RelayLayer` when the control plane is enabled

use std::fs;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::relay::RelayLayer;
use crate::{TelemetryConfig, TelemetryError};

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Build the filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_directive()))
        .map_err(|e| TelemetryError::Init(e.to_string()))
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set or the log folder cannot be
/// created.
pub fn init_logging(
    config: &TelemetryConfig,
    relay: Option<RelayLayer>,
) -> Result<LoggingGuard, TelemetryError> {
    let env_filter = env_filter(config)?;

    let (file_layer, file_guard) = match &config.log_folder {
        Some(folder) => {
            fs::create_dir_all(folder)?;
            let appender = tracing_appender::rolling::daily(folder, config.file_prefix());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let text_layer = (config.console_output && !config.json_logs)
        .then(|| fmt::layer().with_target(true).with_ansi(true));
    let json_layer = (config.console_output && config.json_logs)
        .then(|| fmt::layer().json().with_target(true));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .with(relay)
        .try_init()
        .map_err(|e| TelemetryError::Init(e.to_string()))?;

    tracing::debug!(
        service = %config.service_name,
        level = config.log_level.as_directive(),
        log_folder = ?config.log_folder,
        "Logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
