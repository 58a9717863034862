//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT or SIGTERM
//! - Translate them into a shutdown request
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handler processes are not signalled; they end with their connection

use tokio::signal::unix::{signal, SignalKind};

/// Resolve once SIGINT or SIGTERM arrives.
pub async fn wait_for_signal() -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }

    tracing::info!("Shutdown signal received");
    Ok(())
}
