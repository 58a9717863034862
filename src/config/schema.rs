//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, port).
    pub listener: ListenerConfig,

    /// Handler program and body delivery.
    pub handler: HandlerConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub bind_address: String,

    /// Port to bind.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl ListenerConfig {
    /// Resolve the configured interface and port into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.bind_address.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 1024,
        }
    }
}

/// Handler program configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HandlerConfig {
    /// Path to the executable that produces responses.
    pub program: PathBuf,

    /// Directory for spooled request bodies. When unset, bodies are passed
    /// through the `REQBODY` environment variable.
    pub spool_dir: Option<PathBuf>,
}

/// Room reserved for the request line and headers on top of the body.
pub const HEADER_ALLOWANCE: usize = 64 * 1024;

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest accepted `Content-Length`, in bytes.
    pub max_body_size: usize,

    /// Largest accumulated request (line + headers + body), in bytes.
    pub max_request_size: usize,

    /// Bytes requested from the socket per read.
    pub read_chunk_size: usize,
}

impl LimitsConfig {
    /// Smallest request ceiling under which a body of `max_body_size` can
    /// still be read in whole chunks after a full header block.
    pub fn min_request_size(&self) -> usize {
        self.max_body_size
            .saturating_add(self.read_chunk_size)
            .saturating_add(HEADER_ALLOWANCE)
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let mut limits = Self {
            max_body_size: 1024 * 1024, // 1MB
            max_request_size: 0,
            read_chunk_size: 1024,
        };
        limits.max_request_size = limits.min_request_size();
        limits
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// How long to wait for client activity, in seconds.
    pub idle_secs: u64,

    /// Hard per-connection deadline in seconds, covering parsing and the
    /// handler run. Zero disables it.
    pub deadline_secs: u64,
}

impl TimeoutConfig {
    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }

    /// The hard deadline, or `None` when disabled.
    pub fn deadline(&self) -> Option<Duration> {
        (self.deadline_secs > 0).then(|| Duration::from_secs(self.deadline_secs))
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_secs: 30,
            deadline_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when verbose.
    pub log_level: String,

    /// Verbose logging of connections, dispatches and rejections.
    pub verbose: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            verbose: true,
        }
    }
}
