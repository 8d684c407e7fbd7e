//! OS interrupt and termination signals

use anyhow::{Context, Result};
#[cfg(not(unix))]
use tracing::warn;

/// Listener for SIGINT and SIGTERM (Ctrl+C elsewhere)
pub struct ShutdownSignals {
    #[cfg(unix)]
    sigint: tokio::signal::unix::Signal,
    #[cfg(unix)]
    sigterm: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    /// Install the handlers. Must be called from inside the runtime.
    #[cfg(unix)]
    pub fn install() -> Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        let sigint = signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
        let sigterm =
            signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
        Ok(Self { sigint, sigterm })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next signal and return its name
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigint.recv() => "SIGINT",
            _ = self.sigterm.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("[LIFECYCLE] Ctrl+C listener failed: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl+C"
    }
}
