//! Shutdown signals.

use std::fmt;
use std::io;
use tokio::signal;

/// Signal that ended the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            #[cfg(unix)]
            ShutdownSignal::Interrupt => f.write_str("SIGINT"),
            #[cfg(not(unix))]
            ShutdownSignal::Interrupt => f.write_str("Ctrl+C"),
            ShutdownSignal::Terminate => f.write_str("SIGTERM"),
        }
    }
}

/// Resolves once the process is asked to stop.
///
/// Both listeners are installed before the first await, so a signal that
/// arrives while the other is being set up is not lost.
#[cfg(unix)]
pub async fn wait_for_shutdown() -> io::Result<ShutdownSignal> {
    use signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::select! {
        _ = interrupt.recv() => ShutdownSignal::Interrupt,
        _ = terminate.recv() => ShutdownSignal::Terminate,
    })
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown() -> io::Result<ShutdownSignal> {
    signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}
