//! reqexec
//!
//! ```text
//!                        ┌───────────────────────────────────────────────┐
//!                        │                   REQEXEC                      │
//!   Client request       │  ┌─────────┐   ┌──────────┐   ┌────────────┐  │
//!   ─────────────────────┼─▶│   net   │──▶│   http   │──▶│  dispatch  │  │
//!                        │  │listener │   │ handler  │   │ body+exec  │  │
//!                        │  └─────────┘   │ + parser │   └─────┬──────┘  │
//!                        │                └────┬─────┘         │         │
//!   Error response       │                     │               ▼         │
//!   ◀────────────────────┼─────────────────────┘        handler program  │
//!   Handler response     │                                     │         │
//!   ◀────────────────────┼─────────────────────────────────────┘         │
//!                        └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use reqexec::config::loader::{finalize, read_config, ConfigError};
use reqexec::config::GatewayConfig;
use reqexec::lifecycle::startup;
use reqexec::observability::logging;

#[derive(Parser)]
#[command(name = "reqexec", version)]
#[command(about = "Minimal HTTP front-end that hands each request to a handler program")]
#[command(after_help = "\
The handler program receives 2 arguments:
  o the request method
  o the request path

The headers are passed through the REQHEADERS environment variable.
The body is passed through the REQBODY environment variable, or on
standard input when a spool directory is given with -d.
Standard output of the handler is the client connection.

Log is on STDERR")]
struct Cli {
    /// Path to an executable that handles requests
    #[arg(short = 'x', long = "handler")]
    handler: Option<PathBuf>,

    /// Interface to bind [default: 0.0.0.0]
    #[arg(short = 'H', long = "host")]
    host: Option<String>,

    /// Port to bind [default: 8080]
    #[arg(short, long)]
    port: Option<u16>,

    /// Spool request bodies to anonymous files in this directory (e.g. /dev/shm)
    #[arg(short = 'd', long = "spool-dir")]
    spool_dir: Option<PathBuf>,

    /// Largest accepted request body in bytes
    #[arg(short = 'b', long = "max-body")]
    max_body: Option<usize>,

    /// Hard per-connection deadline in seconds, 0 to disable
    #[arg(short = 't', long = "deadline")]
    deadline: Option<u64>,

    /// Quiet, turn off verbose logging
    #[arg(short, long)]
    quiet: bool,

    /// TOML configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<GatewayConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GatewayConfig::default(),
        };

        if let Some(handler) = self.handler {
            config.handler.program = handler;
        }
        if let Some(host) = self.host {
            config.listener.bind_address = host;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(dir) = self.spool_dir {
            config.handler.spool_dir = Some(dir);
        }
        if let Some(max_body) = self.max_body {
            config.limits.max_body_size = max_body;
            config.limits.max_request_size = config
                .limits
                .max_request_size
                .max(config.limits.min_request_size());
        }
        if let Some(deadline) = self.deadline {
            config.timeouts.deadline_secs = deadline;
        }
        if self.quiet {
            config.observability.verbose = false;
        }

        finalize(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        port = config.listener.port,
        handler = %config.handler.program.display(),
        max_body_size = config.limits.max_body_size,
        deadline_secs = config.timeouts.deadline_secs,
        "reqexec v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
