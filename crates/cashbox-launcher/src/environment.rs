//! Startup environment summary.

use std::path::PathBuf;

use cashbox_types::LAUNCHER_VERSION;
use tracing::info;
use uuid::Uuid;

/// Facts about the host logged once at supervisor startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSummary {
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
    pub elevated: bool,
    pub working_directory: Option<PathBuf>,
    pub cashbox_id: Option<Uuid>,
}

impl EnvironmentSummary {
    pub fn collect(cashbox_id: Option<Uuid>) -> Self {
        Self {
            version: LAUNCHER_VERSION,
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            elevated: is_elevated(),
            working_directory: std::env::current_dir().ok(),
            cashbox_id,
        }
    }

    pub fn log(&self) {
        info!("===========================================");
        info!("  CASHBOX LAUNCHER v{}", self.version);
        info!("===========================================");
        info!("  OS:           {} ({})", self.os, self.arch);
        info!("  Elevated:     {}", self.elevated);
        info!(
            "  Working dir:  {}",
            self.working_directory
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<unknown>".to_string())
        );
        info!(
            "  Cashbox:      {}",
            self.cashbox_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "<not configured>".to_string())
        );
        info!("===========================================");
    }
}

#[cfg(unix)]
fn is_elevated() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
fn is_elevated() -> bool {
    false
}
