//! OS termination signals.
//!
//! Handlers are installed before [`cancel_on_signal`] returns, so a signal
//! arriving during startup is not lost. Unix observes SIGINT and SIGTERM;
//! elsewhere only Ctrl-C.

use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Cancel `token` on the first termination signal.
///
/// The returned task ends when a signal arrives or when `token` is cancelled
/// by someone else.
#[cfg(unix)]
pub fn cancel_on_signal(token: CancellationToken) -> io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let name = tokio::select! {
            _ = token.cancelled() => return,
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        info!(signal = name, "Shutdown signal received");
        token.cancel();
    }))
}

#[cfg(not(unix))]
pub fn cancel_on_signal(token: CancellationToken) -> io::Result<JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => return,
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Ctrl-C handler failed");
                    return;
                }
            }
        }
        info!(signal = "ctrl-c", "Shutdown signal received");
        token.cancel();
    }))
}
