//! Process entry points for both roles of the executable.

use std::sync::Arc;

use anyhow::{Context, Result};
use cashbox_control::{ControlPlaneAddress, ControlPlaneClient};
use cashbox_telemetry::{init_logging, RelayLayer, TelemetryConfig, TracingLogSink};
use cashbox_types::{
    decode_argument, CashboxConfiguration, LauncherConfiguration, PlebeianConfiguration,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::{PlebeianArgs, RunArgs};
use crate::monarch::{LogReadiness, Monarch, Orchestrator, SelfExeLauncher};
use crate::packages::LocalPackageCache;
use crate::plebeian::{relay, Plebeian, WorkerExit};
use crate::plugins::{builtin, PluginRegistry};
use crate::signals;

/// Records buffered between the relay layer and the forwarder task.
const RELAY_CHANNEL_CAPACITY: usize = 1024;

/// Supervisor: load configuration, start every component, run until
/// shutdown.
pub async fn run_monarch(args: RunArgs) -> Result<()> {
    let launcher = LauncherConfiguration::load(args.launcher_configuration.as_deref())
        .context("Failed to load launcher configuration")?;
    let _logging = init_logging(&TelemetryConfig::from_launcher(&launcher, "launcher"), None)
        .context("Failed to initialize logging")?;

    let cashbox = CashboxConfiguration::load(&args.cashbox_configuration).with_context(|| {
        format!(
            "Failed to load cashbox configuration {}",
            args.cashbox_configuration.display()
        )
    })?;

    std::fs::create_dir_all(&launcher.service_folder).with_context(|| {
        format!(
            "Failed to create service folder {}",
            launcher.service_folder.display()
        )
    })?;

    let token = CancellationToken::new();
    signals::cancel_on_signal(token.clone()).context("Failed to install signal handlers")?;

    let control_address = launcher
        .use_control_plane
        .then(|| ControlPlaneAddress::for_launcher(&launcher.service_folder, launcher.launcher_port));
    let packages = Arc::new(
        LocalPackageCache::new(launcher.packages_folder()).with_builtins(builtin::PACKAGES),
    );
    let process_launcher =
        Arc::new(SelfExeLauncher::current().context("Failed to locate the launcher executable")?);

    let monarch = Monarch::new(launcher, process_launcher, control_address, token);
    let control_server = monarch
        .start_control_plane(Arc::new(TracingLogSink))
        .context("Failed to start control plane")?;

    let orchestrator = Orchestrator::new(monarch.clone(), packages, Arc::new(LogReadiness));
    let result = orchestrator.run(&cashbox).await;

    monarch.shutdown().await;
    if let Some(server) = control_server {
        server.shutdown().await;
    }

    result.context("Cashbox startup failed")?;
    info!("Cashbox launcher stopped");
    Ok(())
}

/// Worker: decode the hand-off, host one component, run until cancelled or
/// orphaned.
pub async fn run_plebeian(args: PlebeianArgs, plugins: PluginRegistry) -> Result<WorkerExit> {
    let config: PlebeianConfiguration = decode_argument(&args.plebeian_configuration)
        .context("Invalid --plebeian-configuration")?;
    let launcher: LauncherConfiguration = decode_argument(&args.launcher_configuration)
        .context("Invalid --launcher-configuration")?;
    launcher
        .validate()
        .context("Invalid --launcher-configuration")?;

    let control_address = (!args.no_control_plane).then(|| {
        args.control_plane_address
            .map(ControlPlaneAddress::new)
            .unwrap_or_else(|| {
                ControlPlaneAddress::for_launcher(&launcher.service_folder, launcher.launcher_port)
            })
    });

    let (relay_layer, relay_records) = match control_address {
        Some(_) => {
            let (layer, records) = RelayLayer::channel(RELAY_CHANNEL_CAPACITY);
            (Some(layer), Some(records))
        }
        None => (None, None),
    };
    let telemetry = TelemetryConfig::from_launcher(&launcher, config.component.id.to_string());
    let _logging = init_logging(&telemetry, relay_layer).context("Failed to initialize logging")?;

    let token = CancellationToken::new();
    signals::cancel_on_signal(token.clone()).context("Failed to install signal handlers")?;

    let tags = relay::relay_tags(&config.component);
    let mut worker = Plebeian::new(config, launcher, plugins, token);
    if let Some(address) = control_address {
        if let Some(records) = relay_records {
            // Relay traffic gets its own connection.
            let relay_client = Arc::new(ControlPlaneClient::new(address.clone()));
            relay::spawn_forwarder(relay_client, records, tags);
        }
        worker = worker.with_control_plane(Arc::new(ControlPlaneClient::new(address)));
    }

    Ok(worker.run().await?)
}
