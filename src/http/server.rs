//! Accept loop and per-connection supervision.
//!
//! # Responsibilities
//! - Accept connections and start one isolated task per connection
//! - Arm the hard per-connection deadline
//! - Confine panics to the connection that raised them
//! - Stop accepting on shutdown and drain in-flight connections

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::sync::broadcast;

use crate::config::GatewayConfig;
use crate::http::handler::{handle_connection, Outcome};
use crate::net::connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
use crate::net::listener::{Accepted, Listener, ListenerError};

/// HTTP front-end dispatching each request to the handler program.
pub struct HttpServer {
    config: Arc<GatewayConfig>,
    tracker: ConnectionTracker,
}

impl HttpServer {
    /// Create a new server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config: Arc::new(config),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Run the accept loop until `shutdown` fires, then drain.
    ///
    /// Shutdown closes the listener; the loop ends on the resulting
    /// [`ListenerError::Closed`].
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(
            handler = %self.config.handler.program.display(),
            spool_dir = ?self.config.handler.spool_dir,
            "Server starting"
        );

        loop {
            let accepted = tokio::select! {
                biased;
                accepted = listener.accept() => accepted,
                _ = shutdown.recv() => {
                    listener.close();
                    continue;
                }
            };

            match accepted {
                Ok(accepted) => {
                    let guard = self.tracker.track();
                    tokio::spawn(supervise(accepted, guard, Arc::clone(&self.config)));
                }
                Err(ListenerError::Closed) => break,
                Err(e) => tracing::warn!(error = %e, "Failed to accept connection"),
            }
        }
        drop(listener);

        tracing::info!(active = self.tracker.active_count(), "Server stopping, draining connections");
        let grace = self.config.timeouts.deadline().unwrap_or_else(|| self.config.timeouts.idle());
        if tokio::time::timeout(grace, self.tracker.wait_for_drain()).await.is_err() {
            tracing::warn!(
                active = self.tracker.active_count(),
                "Drain timed out, abandoning connections"
            );
        }

        tracing::info!("Server stopped");
    }
}

/// Run one connection under its hard deadline and panic guard.
///
/// Dropping the connection future on expiry closes the socket and kills the
/// handler process, whatever the connection was doing at the time.
async fn supervise(accepted: Accepted, guard: ConnectionGuard, config: Arc<GatewayConfig>) {
    let Accepted {
        stream,
        peer_addr,
        slot: _slot,
    } = accepted;
    let id = guard.id();
    tracing::info!(connection_id = %id, peer_addr = %peer_addr, "Got a connection");

    let unit = AssertUnwindSafe(handle_connection(stream, id, &config)).catch_unwind();
    let result = match config.timeouts.deadline() {
        Some(deadline) => match tokio::time::timeout(deadline, unit).await {
            Ok(result) => result,
            Err(_) => {
                tracing::info!(
                    connection_id = %id,
                    deadline_secs = deadline.as_secs(),
                    "Deadline exceeded, connection terminated"
                );
                return;
            }
        },
        None => unit.await,
    };

    match result {
        Ok(outcome) => log_outcome(id, &outcome),
        Err(_) => tracing::error!(connection_id = %id, "Connection task panicked"),
    }
}

fn log_outcome(id: ConnectionId, outcome: &Outcome) {
    match outcome {
        Outcome::Dispatched(status) if !status.success() => {
            tracing::info!(connection_id = %id, %status, "Handler failed")
        }
        Outcome::Aborted => tracing::debug!(connection_id = %id, "Connection aborted"),
        other => tracing::debug!(connection_id = %id, outcome = ?other, "Connection finished"),
    }
}
