//! # Startup Orchestrator
//!
//! ```text
//! environment summary ─► package warm-up ─► for each component:
//!                                             ensure_downloaded
//!                                             start_component
//!                                          ─► notify ready
//!                                          ─► await every "stopped"
//!                                          ─► cancel
//! ```
//!
//! Components start strictly one after another: signature devices first,
//! then queues, then helpers. The first failure cancels everything.

use std::sync::Arc;

use cashbox_types::CashboxConfiguration;
use tracing::{error, info, warn};

use super::error::SupervisorError;
use super::state::StopOutcome;
use super::Monarch;
use crate::environment::EnvironmentSummary;
use crate::packages::PackageDownloader;

/// Told once every configured component is up.
pub trait ReadinessNotifier: Send + Sync {
    fn notify_ready(&self, components: usize);
}

/// Readiness reported as a log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReadiness;

impl ReadinessNotifier for LogReadiness {
    fn notify_ready(&self, components: usize) {
        info!(components, "Cashbox launcher ready");
    }
}

pub struct Orchestrator {
    monarch: Monarch,
    packages: Arc<dyn PackageDownloader>,
    readiness: Arc<dyn ReadinessNotifier>,
}

impl Orchestrator {
    pub fn new(
        monarch: Monarch,
        packages: Arc<dyn PackageDownloader>,
        readiness: Arc<dyn ReadinessNotifier>,
    ) -> Self {
        Self {
            monarch,
            packages,
            readiness,
        }
    }

    pub fn monarch(&self) -> &Monarch {
        &self.monarch
    }

    /// Start every component, then run until all of them stopped or the
    /// token is cancelled.
    ///
    /// Returns an error if any component fails to start. The token is
    /// cancelled on every return path.
    pub async fn run(&self, cashbox: &CashboxConfiguration) -> Result<(), SupervisorError> {
        EnvironmentSummary::collect(cashbox.cashbox_id.or(self.monarch.config().cashbox_id)).log();

        if let Err(e) = self.packages.warm_up().await {
            warn!(error = %e, "Package cache warm-up failed");
        }

        let components = cashbox.components();
        for (kind, component) in &components {
            if self.monarch.token().is_cancelled() {
                info!("Shutdown requested during startup");
                return Ok(());
            }

            let started = async {
                self.packages.ensure_downloaded(component).await?;
                self.monarch.start_component((*component).clone(), *kind).await
            };
            if let Err(e) = started.await {
                error!(
                    component_id = %component.id,
                    package = %component.package,
                    kind = %kind,
                    error = %e,
                    "Component failed to start, aborting startup"
                );
                self.monarch.token().cancel();
                return Err(e);
            }
        }

        self.readiness.notify_ready(components.len());
        self.monarch.registry().print_status();

        if components.is_empty() {
            info!("No components configured, waiting for shutdown");
            self.monarch.token().cancelled().await;
            return Ok(());
        }

        for (handle, outcome) in self.monarch.wait_all_stopped().await {
            if let StopOutcome::Aborted(reason) = outcome {
                warn!(
                    component_id = %handle.id(),
                    package = %handle.config().package,
                    reason = %reason,
                    "Component terminated abnormally"
                );
            }
        }

        self.monarch.token().cancel();
        Ok(())
    }
}
