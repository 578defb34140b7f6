//! # Launcher Configuration
//!
//! Launcher-wide settings shared by the supervisor and (serialized onto the
//! command line) by every worker.
//!
//! ## Sources
//!
//! 1. Defaults (`LauncherConfiguration::default()`)
//! 2. JSON file, if one is given and exists
//! 3. `CASHBOX_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// File could not be read.
    #[error("failed to read configuration {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON for the expected shape.
    #[error("failed to parse configuration {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Two components share an identifier.
    #[error("component {0} is configured more than once")]
    DuplicateComponent(Uuid),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Log verbosity. `Trace` is the most detailed level and also enables
/// request/response body logging in the hosting layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    #[must_use]
    pub fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Whether this is the most detailed verbosity.
    #[must_use]
    pub fn is_most_detailed(&self) -> bool {
        matches!(self, Self::Trace)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "verbose" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" | "information" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" | "fatal" => Ok(Self::Error),
            other => Err(ConfigurationError::Invalid(format!("unknown log level '{other}'"))),
        }
    }
}

/// What the supervisor does when a worker exits without a shutdown request.
///
/// `OnCleanExit` restarts only workers that exited with code 0 (for example
/// after losing their supervisor connection) and treats any other exit as a
/// permanent failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RestartPolicy {
    /// Restart after exit code 0, fail permanently otherwise (default).
    #[default]
    OnCleanExit,
    /// Restart after every unexpected exit.
    OnAnyExit,
    /// Never restart.
    Never,
}

impl RestartPolicy {
    /// Decide whether an unexpected exit should be followed by a restart.
    ///
    /// `exit_code` is `None` when the process was terminated by a signal.
    #[must_use]
    pub fn should_restart(&self, exit_code: Option<i32>) -> bool {
        match self {
            Self::OnCleanExit => exit_code == Some(0),
            Self::OnAnyExit => true,
            Self::Never => false,
        }
    }
}

/// Restart delay growth.
///
/// The delay for attempt `n` is `first × factor^n`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackoffSettings {
    /// Delay before the first restart, in milliseconds.
    pub first_ms: u64,
    /// Upper bound, in milliseconds.
    pub max_ms: u64,
    /// Multiplicative growth factor.
    pub factor: f64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            first_ms: 500,
            max_ms: 30_000,
            factor: 2.0,
        }
    }
}

impl BackoffSettings {
    /// Delay for the given attempt (0-indexed).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let max = Duration::from_millis(self.max_ms);
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = Duration::from_millis(self.first_ms).as_secs_f64() * self.factor.powi(exp);

        if !secs.is_finite() || secs < 0.0 || secs > max.as_secs_f64() {
            max
        } else {
            Duration::from_secs_f64(secs)
        }
    }
}

/// Launcher-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LauncherConfiguration {
    /// Cashbox identifier (for diagnostics).
    #[serde(rename = "ftCashBoxId")]
    pub cashbox_id: Option<Uuid>,
    /// Working folder for sockets, packages and logs.
    pub service_folder: PathBuf,
    /// Package cache folder; defaults to `<service folder>/packages`.
    pub packages_folder: Option<PathBuf>,
    /// Log folder; defaults to `<service folder>/logs`.
    pub log_folder: Option<PathBuf>,
    /// Port number naming the control-plane socket or pipe.
    pub launcher_port: u16,
    /// Whether workers talk back to the supervisor.
    pub use_control_plane: bool,
    /// Log verbosity.
    pub log_level: LogLevel,
    /// Worker heartbeat interval.
    pub ping_interval_seconds: u64,
    /// Time a listener or worker gets to stop on its own.
    pub shutdown_timeout_seconds: u64,
    /// Per-request timeout on HTTP listeners.
    pub request_timeout_seconds: u64,
    /// Maximum accepted request body.
    pub max_request_body_bytes: usize,
    /// Restart policy for unexpected worker exits.
    pub restart_policy: RestartPolicy,
    /// Restart delay growth.
    pub restart_backoff: BackoffSettings,
    /// Captured worker output lines kept for diagnostics.
    pub output_buffer_lines: usize,
}

impl Default for LauncherConfiguration {
    fn default() -> Self {
        Self {
            cashbox_id: None,
            service_folder: std::env::temp_dir().join("cashbox-launcher"),
            packages_folder: None,
            log_folder: None,
            launcher_port: 5050,
            use_control_plane: true,
            log_level: LogLevel::Info,
            ping_interval_seconds: 10,
            shutdown_timeout_seconds: 30,
            request_timeout_seconds: 60,
            max_request_body_bytes: 4 * 1024 * 1024,
            restart_policy: RestartPolicy::OnCleanExit,
            restart_backoff: BackoffSettings::default(),
            output_buffer_lines: 200,
        }
    }
}

impl LauncherConfiguration {
    /// Load from an optional JSON file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut config = match path {
            Some(path) if path.exists() => {
                let raw = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_json::from_str(&raw).map_err(|source| ConfigurationError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            Some(path) => {
                tracing::warn!(path = ?path, "Launcher configuration not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Override values from `CASHBOX_*` variables.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigurationError> {
        if let Some(level) = lookup("CASHBOX_LOG_LEVEL") {
            self.log_level = level.parse()?;
        }
        if let Some(port) = lookup("CASHBOX_LAUNCHER_PORT") {
            self.launcher_port = port.parse().map_err(|_| {
                ConfigurationError::Invalid(format!("CASHBOX_LAUNCHER_PORT '{port}' is not a port"))
            })?;
        }
        if let Some(folder) = lookup("CASHBOX_SERVICE_FOLDER") {
            self.service_folder = PathBuf::from(folder);
        }
        Ok(())
    }

    /// Validate ranges.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.ping_interval_seconds == 0 {
            return Err(ConfigurationError::Invalid(
                "pingIntervalSeconds cannot be 0".into(),
            ));
        }
        if self.max_request_body_bytes == 0 {
            return Err(ConfigurationError::Invalid(
                "maxRequestBodyBytes cannot be 0".into(),
            ));
        }
        if self.restart_backoff.factor < 1.0 {
            return Err(ConfigurationError::Invalid(
                "restartBackoff.factor must be >= 1.0".into(),
            ));
        }
        Ok(())
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn packages_folder(&self) -> PathBuf {
        self.packages_folder
            .clone()
            .unwrap_or_else(|| self.service_folder.join("packages"))
    }

    pub fn log_folder(&self) -> PathBuf {
        self.log_folder
            .clone()
            .unwrap_or_else(|| self.service_folder.join("logs"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = LauncherConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.restart_policy, RestartPolicy::OnCleanExit);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_restart_policy_is_asymmetric() {
        let policy = RestartPolicy::default();
        assert!(policy.should_restart(Some(0)));
        assert!(!policy.should_restart(Some(1)));
        assert!(!policy.should_restart(None));
    }

    #[test]
    fn test_alternative_restart_policies() {
        assert!(RestartPolicy::OnAnyExit.should_restart(Some(3)));
        assert!(RestartPolicy::OnAnyExit.should_restart(None));
        assert!(!RestartPolicy::Never.should_restart(Some(0)));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let backoff = BackoffSettings {
            first_ms: 100,
            max_ms: 1_000,
            factor: 2.0,
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("CASHBOX_LOG_LEVEL", "verbose"),
            ("CASHBOX_LAUNCHER_PORT", "6060"),
        ]
        .into_iter()
        .collect();

        let mut config = LauncherConfiguration::default();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Trace);
        assert!(config.log_level.is_most_detailed());
        assert_eq!(config.launcher_port, 6060);
    }

    #[test]
    fn test_invalid_port_override_rejected() {
        let mut config = LauncherConfiguration::default();
        let result = config.apply_env_overrides(|key| {
            (key == "CASHBOX_LAUNCHER_PORT").then(|| "not-a-port".to_string())
        });
        assert!(matches!(result, Err(ConfigurationError::Invalid(_))));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LauncherConfiguration =
            serde_json::from_str(r#"{ "launcherPort": 7070, "logLevel": "debug" }"#).unwrap();
        assert_eq!(config.launcher_port, 7070);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.output_buffer_lines, 200);
    }

    #[test]
    fn test_derived_folders() {
        let config = LauncherConfiguration {
            service_folder: PathBuf::from("/srv/cashbox"),
            ..Default::default()
        };
        assert_eq!(config.packages_folder(), PathBuf::from("/srv/cashbox/packages"));
        assert_eq!(config.log_folder(), PathBuf::from("/srv/cashbox/logs"));
    }
}
