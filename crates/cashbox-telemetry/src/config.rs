//! Logging configuration derived from the launcher configuration and
//! environment variables.

use std::env;
use std::path::PathBuf;

use cashbox_types::{LauncherConfiguration, LogLevel};

/// Configuration for console and file logging.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Process role shown in log file names (`launcher`, or a component id)
    pub service_name: String,

    /// Configured level; `RUST_LOG` still wins when set
    pub log_level: LogLevel,

    /// Folder for rolling log files; `None` disables file output
    pub log_folder: Option<PathBuf>,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether console output is JSON
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "cashbox-launcher".to_string(),
            log_level: LogLevel::Info,
            log_folder: None,
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Derive the logging setup for one process from the launcher configuration.
    ///
    /// # Environment Variables
    ///
    /// - `CASHBOX_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `CASHBOX_JSON_LOGS`: JSON console output (default: false)
    pub fn from_launcher(config: &LauncherConfiguration, service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            log_level: config.log_level,
            log_folder: Some(config.log_folder()),
            console_output: env::var("CASHBOX_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
            json_logs: env::var("CASHBOX_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// File name prefix for the rolling appender.
    pub fn file_prefix(&self) -> String {
        format!("{}.log", self.service_name)
    }
}
