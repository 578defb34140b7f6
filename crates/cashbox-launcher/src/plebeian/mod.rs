//! # Plebeian - Worker Runtime
//!
//! Runs inside each spawned worker process and hosts exactly one component.
//!
//! ```text
//! resolve business ─► host every bind URI ─► helper hooks ─► ReportStarted
//!                         (tolerates partial        (begin, end)
//!                          bind failures)
//!                                                         │
//!                   ┌─────────────────────────────────────┘
//!                   ▼
//!             ping every interval ──── ping fails ───► Orphaned: abort listeners
//!                   │
//!              cancellation ─────────────────────────► Shutdown: helper stop,
//!                                                      drain listeners
//! ```
//!
//! Both exits are clean (exit code 0). Startup failures are errors.

pub mod error;
pub mod relay;

use std::sync::Arc;

use cashbox_control::ControlPlane;
use cashbox_hosting::{host, HostingOptions, ListenerHandle};
use cashbox_types::{LauncherConfiguration, PlebeianConfiguration};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::plugins::{Business, PluginRegistry};

pub use error::WorkerError;

/// How a worker that started successfully ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Cancelled by a termination signal.
    Shutdown,
    /// Lost its supervisor.
    Orphaned,
}

pub struct Plebeian {
    config: PlebeianConfiguration,
    launcher: LauncherConfiguration,
    plugins: PluginRegistry,
    control: Option<Arc<dyn ControlPlane>>,
    token: CancellationToken,
}

impl Plebeian {
    /// A worker without a control plane. Cancelling `token` stops it.
    pub fn new(
        config: PlebeianConfiguration,
        launcher: LauncherConfiguration,
        plugins: PluginRegistry,
        token: CancellationToken,
    ) -> Self {
        Self {
            config,
            launcher,
            plugins,
            control: None,
            token,
        }
    }

    #[must_use]
    pub fn with_control_plane(mut self, control: Arc<dyn ControlPlane>) -> Self {
        self.control = Some(control);
        self
    }

    pub async fn run(self) -> Result<WorkerExit, WorkerError> {
        let component = &self.config.component;
        info!(
            component_id = %component.id,
            package = %component.package,
            version = %component.version,
            kind = %self.config.kind,
            "Worker starting"
        );

        self.launcher.validate()?;
        let business = self.plugins.resolve(component, self.config.kind)?;
        let listeners = self.host_all(&business).await?;

        if let Err(e) = self.run_startup_hooks(&business).await {
            abort_all(listeners);
            return Err(e);
        }

        self.report_started().await;

        let exit = self.liveness().await;
        match exit {
            WorkerExit::Orphaned => {
                abort_all(listeners);
                self.token.cancel();
            }
            WorkerExit::Shutdown => {
                if let Some(helper) = business.helper() {
                    if let Err(e) = helper.stop().await {
                        warn!(component_id = %component.id, error = %e, "Helper stop hook failed");
                    }
                }
                self.drain(listeners).await;
            }
        }

        info!(component_id = %component.id, exit = ?exit, "Worker exiting");
        Ok(exit)
    }

    /// Host the business on every bind URI, tolerating individual failures.
    async fn host_all(&self, business: &Business) -> Result<Vec<ListenerHandle>, WorkerError> {
        let component = &self.config.component;
        if !component.has_network_surface() {
            return Ok(Vec::new());
        }
        let Some(service) = business.service() else {
            warn!(
                component_id = %component.id,
                business = business.name(),
                "Bind URIs configured for a component without a network surface, ignoring"
            );
            return Ok(Vec::new());
        };

        let options = HostingOptions::from_launcher(&self.launcher);
        let mut listeners = Vec::with_capacity(component.urls.len());
        for url in &component.urls {
            match host(service.clone(), url, business.endpoints(), &options, &self.token).await {
                Ok(listener) => listeners.push(listener),
                Err(e) => error!(
                    component_id = %component.id,
                    url = %url,
                    error = %e,
                    "Failed to host bind URI"
                ),
            }
        }

        if listeners.is_empty() {
            return Err(WorkerError::NoBindSucceeded {
                component_id: component.id,
                configured: component.urls.len(),
            });
        }
        Ok(listeners)
    }

    async fn run_startup_hooks(&self, business: &Business) -> Result<(), WorkerError> {
        let Some(helper) = business.helper() else {
            return Ok(());
        };
        helper
            .begin_startup()
            .await
            .map_err(|source| WorkerError::HelperHook {
                hook: "begin_startup",
                source,
            })?;
        helper
            .end_startup()
            .await
            .map_err(|source| WorkerError::HelperHook {
                hook: "end_startup",
                source,
            })
    }

    async fn report_started(&self) {
        let id = self.config.component.id;
        match &self.control {
            Some(control) => match control.report_started(id).await {
                Ok(()) => info!(component_id = %id, "Reported started"),
                Err(e) => warn!(component_id = %id, error = %e, "Failed to report started"),
            },
            None => info!(component_id = %id, "Started without control plane"),
        }
    }

    async fn liveness(&self) -> WorkerExit {
        let Some(control) = &self.control else {
            self.token.cancelled().await;
            return WorkerExit::Shutdown;
        };

        let mut ticker = tokio::time::interval(self.launcher.ping_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => return WorkerExit::Shutdown,
                _ = ticker.tick() => {
                    if let Err(e) = control.ping().await {
                        error!(
                            component_id = %self.config.component.id,
                            error = %e,
                            "Launcher unreachable, terminating"
                        );
                        return WorkerExit::Orphaned;
                    }
                }
            }
        }
    }

    async fn drain(&self, listeners: Vec<ListenerHandle>) {
        let timeout = self.launcher.shutdown_timeout();
        let mut shutdowns = JoinSet::new();
        for listener in listeners {
            shutdowns.spawn(async move {
                let uri = listener.uri().to_string();
                (uri, listener.shutdown(timeout).await)
            });
        }
        while let Some(joined) = shutdowns.join_next().await {
            if let Ok((uri, false)) = joined {
                warn!(uri = %uri, "Listener did not drain in time");
            }
        }
    }
}

fn abort_all(listeners: Vec<ListenerHandle>) {
    for listener in listeners {
        listener.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::builtin;
    use cashbox_types::{ComponentConfiguration, ComponentKind};
    use std::time::Duration;
    use uuid::Uuid;

    fn worker(package: &str, kind: ComponentKind, urls: &[&str]) -> PlebeianConfiguration {
        let mut component = ComponentConfiguration::new(Uuid::new_v4(), package, "1.0.0");
        component.urls = urls.iter().map(|u| u.to_string()).collect();
        PlebeianConfiguration { component, kind }
    }

    #[tokio::test]
    async fn test_all_binds_failing_is_fatal() {
        let token = CancellationToken::new();
        let plebeian = Plebeian::new(
            worker(builtin::QUEUE_PACKAGE, ComponentKind::Queue, &["soap://127.0.0.1:0"]),
            LauncherConfiguration::default(),
            PluginRegistry::with_builtins(),
            token,
        );

        let err = plebeian.run().await.unwrap_err();
        assert!(matches!(err, WorkerError::NoBindSucceeded { configured: 1, .. }));
    }

    #[tokio::test]
    async fn test_unknown_package_is_fatal() {
        let plebeian = Plebeian::new(
            worker("Vendor.Missing", ComponentKind::Queue, &[]),
            LauncherConfiguration::default(),
            PluginRegistry::with_builtins(),
            CancellationToken::new(),
        );
        assert!(matches!(plebeian.run().await, Err(WorkerError::Plugin(_))));
    }

    #[tokio::test]
    async fn test_zero_ping_interval_is_rejected() {
        use cashbox_control::{ControlPlaneAddress, ControlPlaneClient};

        let launcher = LauncherConfiguration {
            ping_interval_seconds: 0,
            ..LauncherConfiguration::default()
        };
        let control = ControlPlaneClient::new(ControlPlaneAddress::new("/nonexistent/cashbox.sock"));
        let plebeian = Plebeian::new(
            worker(builtin::HELPER_PACKAGE, ComponentKind::Helper, &[]),
            launcher,
            PluginRegistry::with_builtins(),
            CancellationToken::new(),
        )
        .with_control_plane(Arc::new(control));

        let err = tokio::time::timeout(Duration::from_secs(5), plebeian.run())
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, WorkerError::Configuration(_)), "{err}");
    }

    #[tokio::test]
    async fn test_standalone_worker_stops_on_cancel() {
        let token = CancellationToken::new();
        let plebeian = Plebeian::new(
            worker(builtin::SCU_DE_PACKAGE, ComponentKind::SignatureDevice, &["grpc://127.0.0.1:0"]),
            LauncherConfiguration::default(),
            PluginRegistry::with_builtins(),
            token.clone(),
        );

        let task = tokio::spawn(plebeian.run());
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();

        let exit = tokio::time::timeout(Duration::from_secs(10), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(exit, WorkerExit::Shutdown);
    }
}
