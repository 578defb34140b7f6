//! Per-worker handle shared between the supervision task, the control-plane
//! service and the orchestrator.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use cashbox_types::{ComponentConfiguration, ComponentKind};
use parking_lot::Mutex;
use tracing::warn;
use uuid::Uuid;

use super::state::{Signal, StartOutcome, StopOutcome, WorkerState};

struct Inner {
    state: WorkerState,
    pid: Option<u32>,
    attempts: u32,
    output: VecDeque<String>,
}

/// One supervised component.
///
/// Mutable fields sit behind a single lock. The shutdown flag is separate so
/// the exit handler can read it without contending with output capture.
pub struct WorkerHandle {
    config: ComponentConfiguration,
    kind: ComponentKind,
    output_capacity: usize,
    inner: Mutex<Inner>,
    shutdown: AtomicBool,
    started: Signal<StartOutcome>,
    stopped: Signal<StopOutcome>,
}

impl WorkerHandle {
    pub fn new(config: ComponentConfiguration, kind: ComponentKind, output_capacity: usize) -> Self {
        Self {
            config,
            kind,
            output_capacity,
            inner: Mutex::new(Inner {
                state: WorkerState::NotStarted,
                pid: None,
                attempts: 0,
                output: VecDeque::with_capacity(output_capacity.min(1024)),
            }),
            shutdown: AtomicBool::new(false),
            started: Signal::new(),
            stopped: Signal::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.config.id
    }

    pub fn config(&self) -> &ComponentConfiguration {
        &self.config
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn state(&self) -> WorkerState {
        self.inner.lock().state
    }

    pub fn pid(&self) -> Option<u32> {
        self.inner.lock().pid
    }

    /// Restart attempts since the worker last reported started.
    pub fn attempts(&self) -> u32 {
        self.inner.lock().attempts
    }

    /// Move to `next`. Invalid transitions are logged and rejected.
    pub fn transition(&self, next: WorkerState) -> bool {
        let mut inner = self.inner.lock();
        Self::transition_locked(&mut inner, self.config.id, next)
    }

    fn transition_locked(inner: &mut Inner, id: Uuid, next: WorkerState) -> bool {
        if inner.state.can_transition_to(next) {
            inner.state = next;
            true
        } else {
            warn!(
                component_id = %id,
                from = %inner.state,
                to = %next,
                "Rejected invalid worker state transition"
            );
            false
        }
    }

    pub fn set_pid(&self, pid: Option<u32>) {
        self.inner.lock().pid = pid;
    }

    /// Append a captured output line, dropping the oldest beyond capacity.
    pub fn record_output(&self, line: impl Into<String>) {
        if self.output_capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        while inner.output.len() >= self.output_capacity {
            inner.output.pop_front();
        }
        inner.output.push_back(line.into());
    }

    pub fn output_snapshot(&self) -> Vec<String> {
        self.inner.lock().output.iter().cloned().collect()
    }

    /// Set the shutdown flag and move to `Stopping`.
    ///
    /// The flag is set before any termination request reaches the process.
    pub fn request_shutdown(&self) {
        let mut inner = self.inner.lock();
        self.shutdown.store(true, Ordering::SeqCst);
        if inner.state.can_transition_to(WorkerState::Stopping) {
            inner.state = WorkerState::Stopping;
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Handle a `ReportStarted` call.
    ///
    /// Resets the restart counter. Reports arriving in any state other than
    /// `Starting` are ignored.
    pub fn mark_started(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != WorkerState::Starting {
            warn!(
                component_id = %self.config.id,
                state = %inner.state,
                "Ignoring start report"
            );
            return false;
        }
        inner.state = WorkerState::Started;
        inner.attempts = 0;
        drop(inner);
        self.started.resolve(StartOutcome::Started);
        true
    }

    /// Return the current attempt index and increment it.
    pub fn next_attempt(&self) -> u32 {
        let mut inner = self.inner.lock();
        let attempt = inner.attempts;
        inner.attempts = inner.attempts.saturating_add(1);
        attempt
    }

    pub fn started(&self) -> &Signal<StartOutcome> {
        &self.started
    }

    pub fn stopped(&self) -> &Signal<StopOutcome> {
        &self.stopped
    }

    /// Final bookkeeping: state `Stopped`, both signals resolved.
    ///
    /// `started` resolves as failed if nobody reported it yet, so waiters in
    /// `start_component` never hang.
    pub fn finish(&self, outcome: StopOutcome) {
        {
            let mut inner = self.inner.lock();
            if inner.state != WorkerState::Stopped {
                Self::transition_locked(&mut inner, self.config.id, WorkerState::Stopped);
            }
            inner.pid = None;
        }
        let reason = match &outcome {
            StopOutcome::Stopped => "worker stopped before reporting started".to_string(),
            StopOutcome::Aborted(reason) => reason.clone(),
        };
        self.started.resolve(StartOutcome::Failed(reason));
        self.stopped.resolve(outcome);
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.config.id)
            .field("package", &self.config.package)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}
