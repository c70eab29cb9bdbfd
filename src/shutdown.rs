//! Shutdown Signals
//! 
//! The relay does not drain sessions on shutdown: once a signal arrives the
//! process exits and every open connection is severed.

use tokio::signal;
use tracing::info;
use crate::Result;

/// Wait for SIGTERM, SIGINT or Ctrl+C and return the name of the signal
pub async fn wait_for_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!("Received {}, shutting down", name);
        Ok(name)
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down");
        Ok("Ctrl+C")
    }
}
