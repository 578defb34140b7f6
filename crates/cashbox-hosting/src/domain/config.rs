//! Per-listener options.

use std::time::Duration;

use cashbox_types::LauncherConfiguration;

/// Options applied to every listener started by `host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostingOptions {
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Maximum accepted request body (HTTP) or line (net.tcp)
    pub max_request_body_bytes: usize,
    /// Buffer and log request/response bodies
    pub body_logging: bool,
}

impl Default for HostingOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            max_request_body_bytes: 4 * 1024 * 1024,
            body_logging: false,
        }
    }
}

impl HostingOptions {
    /// Derive from the launcher configuration. Body logging follows the most
    /// detailed log level.
    pub fn from_launcher(config: &LauncherConfiguration) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            max_request_body_bytes: config.max_request_body_bytes,
            body_logging: config.log_level.is_most_detailed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashbox_types::LogLevel;

    #[test]
    fn test_body_logging_only_at_trace() {
        let mut launcher = LauncherConfiguration::default();
        assert!(!HostingOptions::from_launcher(&launcher).body_logging);

        launcher.log_level = LogLevel::Trace;
        assert!(HostingOptions::from_launcher(&launcher).body_logging);
    }
}
