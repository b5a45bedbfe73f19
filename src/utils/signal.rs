//! Process signals that end the node server
//!
//! The framework stops a node server by signalling its process; interactive
//! runs end with Ctrl+C. Either way the bridge must be stopped before exit.

use std::fmt;
use tracing::warn;

/// Which signal asked the node server to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM
    Terminate,
    /// SIGINT or Ctrl+C
    Interrupt,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownSignal::Terminate => write!(f, "SIGTERM"),
            ShutdownSignal::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Wait for SIGTERM or SIGINT and report which one arrived
///
/// A signal whose handler cannot be registered is logged and never fires, so
/// the node server then only stops through the framework.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> ShutdownSignal {
    use tokio::signal::unix::SignalKind;

    let mut sigterm = listen(SignalKind::terminate(), ShutdownSignal::Terminate);
    let mut sigint = listen(SignalKind::interrupt(), ShutdownSignal::Interrupt);

    tokio::select! {
        _ = recv(&mut sigterm) => ShutdownSignal::Terminate,
        _ = recv(&mut sigint) => ShutdownSignal::Interrupt,
    }
}

#[cfg(unix)]
fn listen(
    kind: tokio::signal::unix::SignalKind,
    which: ShutdownSignal,
) -> Option<tokio::signal::unix::Signal> {
    match tokio::signal::unix::signal(kind) {
        Ok(signal) => Some(signal),
        Err(e) => {
            warn!("Failed to register {} handler: {}", which, e);
            None
        }
    }
}

#[cfg(unix)]
async fn recv(signal: &mut Option<tokio::signal::unix::Signal>) {
    match signal {
        Some(signal) => {
            signal.recv().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}
