//! # Worker State Machine
//!
//! ```text
//! NotStarted ──► Starting ──► Started ──► Stopping ──► Stopped
//!                  ▲  │          │           ▲            ▲
//!                  │  └──────────┴─► Crashed ┘────────────┤
//!                  │                   │                  │
//!                  └─── Restarting ◄───┘──────────────────┘
//! ```
//!
//! `Stopped` is terminal. Every transition goes through
//! [`WorkerState::can_transition_to`]; anything else is rejected.

use std::fmt;

use tokio::sync::watch;

/// Lifecycle state of one supervised worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Handle created, no process yet.
    NotStarted,
    /// Process spawned, waiting for it to report started.
    Starting,
    /// Worker reported started.
    Started,
    /// Termination requested.
    Stopping,
    /// Final state.
    Stopped,
    /// Process exited without a shutdown request.
    Crashed,
    /// Waiting out the restart backoff.
    Restarting,
}

impl WorkerState {
    /// Whether `self → next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (NotStarted, Starting)
                | (NotStarted, Stopped)
                | (Starting, Started)
                | (Starting, Crashed)
                | (Starting, Stopping)
                | (Starting, Stopped)
                | (Started, Stopping)
                | (Started, Crashed)
                | (Crashed, Restarting)
                | (Crashed, Stopping)
                | (Crashed, Stopped)
                | (Restarting, Starting)
                | (Restarting, Stopping)
                | (Restarting, Stopped)
                | (Stopping, Stopped)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == WorkerState::Stopped
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Crashed => "crashed",
            Self::Restarting => "restarting",
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolution of a worker's "started" signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    Failed(String),
}

/// Resolution of a worker's "stopped" signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited after a shutdown request.
    Stopped,
    /// Terminated abnormally and will not be restarted.
    Aborted(String),
}

/// A value resolved at most once and awaited by any number of tasks.
///
/// Later resolutions are ignored.
#[derive(Debug)]
pub struct Signal<T> {
    tx: watch::Sender<Option<T>>,
}

impl<T: Clone> Signal<T> {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Resolve the signal. Returns `false` if it was already resolved.
    pub fn resolve(&self, value: T) -> bool {
        self.tx.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(value);
                true
            } else {
                false
            }
        })
    }

    /// Current value, if resolved.
    pub fn get(&self) -> Option<T> {
        self.tx.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Wait until the signal is resolved.
    pub async fn wait(&self) -> T {
        let mut rx = self.tx.subscribe();
        loop {
            if let Some(value) = rx.borrow_and_update().as_ref() {
                return value.clone();
            }
            if rx.changed().await.is_err() {
                // Unreachable while `self` holds the sender.
                std::future::pending::<()>().await;
            }
        }
    }
}

impl<T: Clone> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_happy_path_transitions() {
        use WorkerState::*;
        let path = [NotStarted, Starting, Started, Stopping, Stopped];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_crash_restart_cycle() {
        use WorkerState::*;
        assert!(Started.can_transition_to(Crashed));
        assert!(Crashed.can_transition_to(Restarting));
        assert!(Restarting.can_transition_to(Starting));
        assert!(Crashed.can_transition_to(Stopped));
    }

    #[test]
    fn test_invalid_transitions() {
        use WorkerState::*;
        assert!(!Stopped.can_transition_to(Starting));
        assert!(!Stopped.can_transition_to(Stopped));
        assert!(!NotStarted.can_transition_to(Started));
        assert!(!Started.can_transition_to(Restarting));
        assert!(!Stopping.can_transition_to(Started));
        assert!(Stopped.is_terminal());
    }

    #[test]
    fn test_signal_resolves_once() {
        let signal = Signal::new();
        assert!(!signal.is_resolved());
        assert!(signal.resolve(StopOutcome::Stopped));
        assert!(!signal.resolve(StopOutcome::Aborted("late".into())));
        assert_eq!(signal.get(), Some(StopOutcome::Stopped));
    }

    #[tokio::test]
    async fn test_signal_wakes_waiters() {
        let signal = Arc::new(Signal::new());
        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.resolve(StartOutcome::Started);

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), StartOutcome::Started);
        }
        // Resolved signals return immediately.
        assert_eq!(signal.wait().await, StartOutcome::Started);
    }
}
