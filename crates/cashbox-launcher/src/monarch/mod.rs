//! # Monarch - Worker Supervisor
//!
//! Spawns one worker process per component and keeps it alive according to
//! the restart policy.
//!
//! ```text
//! start_component(config, kind)
//!        │
//!        ▼
//!  ┌───────────┐ spawn  ┌──────────────┐ ReportStarted ┌────────────────┐
//!  │ register  │──────► │ supervise    │ ◄──────────── │ control plane  │
//!  │ handle    │        │ task         │               │ service        │
//!  └───────────┘        └──────┬───────┘               └────────────────┘
//!        │                     │ process exit
//!        │ await "started"     ▼
//!        ▼              shutdown flag set? ── yes ──► Stopped
//!     Ok / Err                 │ no
//!                              ▼
//!                      RestartPolicy::should_restart?
//!                        │ yes              │ no
//!                        ▼                  ▼
//!                   backoff, respawn    log output, abort "stopped"
//! ```
//!
//! On cancellation every worker is asked to terminate (SIGTERM on Unix) and
//! killed only once the shutdown timeout has elapsed.

pub mod control;
pub mod error;
pub mod handle;
pub mod launcher;
pub mod orchestrator;
pub mod registry;
pub mod state;

use std::io;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use cashbox_control::{ControlPlaneAddress, ControlPlaneServer};
use cashbox_telemetry::LogSink;
use cashbox_types::{ComponentConfiguration, ComponentKind, LauncherConfiguration, PlebeianConfiguration};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, trace, warn};

pub use control::MonarchControlService;
pub use error::SupervisorError;
pub use handle::WorkerHandle;
pub use launcher::{ProcessLauncher, SelfExeLauncher};
pub use orchestrator::{LogReadiness, Orchestrator, ReadinessNotifier};
pub use registry::WorkerRegistry;
pub use state::{Signal, StartOutcome, StopOutcome, WorkerState};

/// Time allowed for output capture to drain after a process exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A spawned process and the tasks capturing its output.
struct RunningWorker {
    child: Child,
    capture: Vec<JoinHandle<()>>,
}

/// The supervisor. Cheap to clone; clones share the registry and token.
#[derive(Clone)]
pub struct Monarch {
    config: Arc<LauncherConfiguration>,
    registry: Arc<WorkerRegistry>,
    launcher: Arc<dyn ProcessLauncher>,
    control_address: Option<ControlPlaneAddress>,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl Monarch {
    pub fn new(
        config: LauncherConfiguration,
        launcher: Arc<dyn ProcessLauncher>,
        control_address: Option<ControlPlaneAddress>,
        token: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(WorkerRegistry::new()),
            launcher,
            control_address,
            token,
            tracker: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &LauncherConfiguration {
        &self.config
    }

    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn control_address(&self) -> Option<&ControlPlaneAddress> {
        self.control_address.as_ref()
    }

    /// The control-plane service answering calls against this registry.
    pub fn control_service(&self, sink: Arc<dyn LogSink>) -> MonarchControlService {
        MonarchControlService::new(self.registry.clone(), sink)
    }

    /// Start the control-plane server, if this supervisor has an address.
    ///
    /// The server outlives [`Monarch::shutdown`]; the caller stops it once
    /// every worker has exited.
    pub fn start_control_plane(
        &self,
        sink: Arc<dyn LogSink>,
    ) -> Result<Option<ControlPlaneServer>, SupervisorError> {
        let Some(address) = self.control_address.clone() else {
            info!("Control plane disabled");
            return Ok(None);
        };
        let service = Arc::new(self.control_service(sink));
        let server = ControlPlaneServer::start(address, service)?;
        Ok(Some(server))
    }

    /// Launch a worker for `config` and wait until it reports started.
    ///
    /// Fails if the component is already supervised, the process cannot be
    /// spawned, or it terminates before reporting started.
    pub async fn start_component(
        &self,
        config: ComponentConfiguration,
        kind: ComponentKind,
    ) -> Result<Arc<WorkerHandle>, SupervisorError> {
        let handle = Arc::new(WorkerHandle::new(config, kind, self.config.output_buffer_lines));
        self.registry.insert(handle.clone())?;

        info!(
            component_id = %handle.id(),
            package = %handle.config().package,
            kind = %kind,
            "Starting component"
        );

        handle.transition(WorkerState::Starting);
        let running = match self.spawn(&handle) {
            Ok(running) => running,
            Err(e) => {
                handle.finish(StopOutcome::Aborted(e.to_string()));
                return Err(e);
            }
        };

        self.tracker
            .spawn(self.clone().supervise(handle.clone(), running));

        match handle.started().wait().await {
            StartOutcome::Started => Ok(handle),
            StartOutcome::Failed(reason) => Err(SupervisorError::StartFailed {
                component_id: handle.id(),
                reason,
            }),
        }
    }

    /// Cancel every worker and wait for all supervision tasks to finish.
    pub async fn shutdown(&self) {
        self.token.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }

    /// Wait for every registered worker's "stopped" signal.
    pub async fn wait_all_stopped(&self) -> Vec<(Arc<WorkerHandle>, StopOutcome)> {
        let mut outcomes = Vec::new();
        for handle in self.registry.handles() {
            let outcome = handle.stopped().wait().await;
            outcomes.push((handle, outcome));
        }
        outcomes
    }

    fn spawn(&self, handle: &Arc<WorkerHandle>) -> Result<RunningWorker, SupervisorError> {
        let worker = PlebeianConfiguration {
            component: handle.config().clone(),
            kind: handle.kind(),
        };
        let mut command =
            self.launcher
                .command(&worker, &self.config, self.control_address.as_ref())?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| SupervisorError::Spawn {
            component_id: handle.id(),
            source,
        })?;
        handle.set_pid(child.id());

        let mut capture = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            capture.push(capture_output(handle.clone(), stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            capture.push(capture_output(handle.clone(), stderr, "stderr"));
        }

        info!(
            component_id = %handle.id(),
            pid = ?child.id(),
            "Worker process spawned"
        );
        Ok(RunningWorker { child, capture })
    }

    async fn supervise(self, handle: Arc<WorkerHandle>, mut running: RunningWorker) {
        loop {
            let exited = tokio::select! {
                status = running.child.wait() => Some(status),
                _ = self.token.cancelled() => None,
            };
            let status = match exited {
                Some(status) => status,
                None => self.terminate(&handle, &mut running.child).await,
            };
            drain_output(&mut running).await;
            handle.set_pid(None);

            if self.token.is_cancelled() {
                handle.request_shutdown();
            }
            if handle.is_shutdown_requested() {
                info!(component_id = %handle.id(), "Worker stopped");
                handle.finish(StopOutcome::Stopped);
                return;
            }

            handle.transition(WorkerState::Crashed);
            let exit_code = status.as_ref().ok().and_then(ExitStatus::code);
            let description = describe_exit(&status);

            if !self.config.restart_policy.should_restart(exit_code) {
                let output = handle.output_snapshot();
                error!(
                    component_id = %handle.id(),
                    package = %handle.config().package,
                    exit = %description,
                    output = %output.join("\n"),
                    "Worker terminated and will not be restarted"
                );
                handle.finish(StopOutcome::Aborted(format!("worker {description}")));
                return;
            }

            handle.transition(WorkerState::Restarting);
            let attempt = handle.next_attempt();
            let delay = self.config.restart_backoff.delay(attempt);
            warn!(
                component_id = %handle.id(),
                exit = %description,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "Worker exited unexpectedly, restarting"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.token.cancelled() => {
                    handle.request_shutdown();
                    handle.finish(StopOutcome::Stopped);
                    return;
                }
            }

            handle.transition(WorkerState::Starting);
            running = match self.spawn(&handle) {
                Ok(running) => running,
                Err(e) => {
                    error!(component_id = %handle.id(), error = %e, "Worker restart failed");
                    handle.finish(StopOutcome::Aborted(e.to_string()));
                    return;
                }
            };
        }
    }

    /// Ask the process to exit, then kill it once the shutdown timeout passes.
    async fn terminate(&self, handle: &WorkerHandle, child: &mut Child) -> io::Result<ExitStatus> {
        handle.request_shutdown();
        request_termination(handle, child);

        let grace = self.config.shutdown_timeout();
        match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(
                    component_id = %handle.id(),
                    timeout_secs = grace.as_secs(),
                    "Worker did not stop in time, killing"
                );
                child.kill().await?;
                child.wait().await
            }
        }
    }
}

#[cfg(unix)]
fn request_termination(handle: &WorkerHandle, child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return;
    };
    let Ok(pid) = i32::try_from(pid) else {
        return;
    };
    if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
        warn!(component_id = %handle.id(), error = %e, "Failed to send SIGTERM");
    }
}

// No portable graceful signal outside Unix.
#[cfg(not(unix))]
fn request_termination(handle: &WorkerHandle, child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(component_id = %handle.id(), error = %e, "Failed to terminate worker");
    }
}

fn capture_output<R>(handle: Arc<WorkerHandle>, reader: R, stream: &'static str) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            trace!(component_id = %handle.id(), stream, line = %line, "Worker output");
            handle.record_output(line);
        }
    })
}

async fn drain_output(running: &mut RunningWorker) {
    for mut task in running.capture.drain(..) {
        if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, &mut task).await.is_err() {
            task.abort();
        }
    }
}

fn describe_exit(status: &io::Result<ExitStatus>) -> String {
    match status {
        Ok(status) => match status.code() {
            Some(code) => format!("exited with code {code}"),
            None => "was terminated by a signal".to_string(),
        },
        Err(e) => format!("could not be awaited: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_exit() {
        let err: io::Result<ExitStatus> = Err(io::Error::other("gone"));
        assert_eq!(describe_exit(&err), "could not be awaited: gone");
    }

    #[cfg(unix)]
    #[test]
    fn test_describe_exit_codes() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(
            describe_exit(&Ok(ExitStatus::from_raw(3 << 8))),
            "exited with code 3"
        );
        assert_eq!(
            describe_exit(&Ok(ExitStatus::from_raw(9))),
            "was terminated by a signal"
        );
    }
}
