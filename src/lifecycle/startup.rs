//! Startup orchestration.
//!
//! # Responsibilities
//! - Bind the listener from validated configuration
//! - Start the server and wire it to OS signals
//! - Report how the server stopped
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Configuration is validated before this point and never changes

use crate::config::GatewayConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::wait_for_signal;
use crate::net::listener::Listener;

/// Run the gateway until SIGINT/SIGTERM, then drain and return.
pub async fn run(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    if let Err(e) = wait_for_signal().await {
        tracing::error!(error = %e, "Failed to install signal handlers, shutting down");
    }
    shutdown.trigger();

    server_task.await?;
    Ok(())
}
