//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the handler program is present and executable
//! - Validate value ranges (timeouts > 0, ports valid, limits ordered)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function over the config plus filesystem metadata
//! - Runs before config is accepted into the system

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::config::schema::{GatewayConfig, HEADER_ALLOWANCE};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingHandler,
    HandlerNotExecutable(String),
    InvalidBindAddress(String),
    ZeroPort,
    ZeroReadChunk,
    RequestLimitTooSmall { max_request_size: usize, required: usize },
    ChunkExceedsRequestLimit { read_chunk_size: usize, max_request_size: usize },
    ZeroIdleTimeout,
    ZeroMaxConnections,
    SpoolDirNotDirectory(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::MissingHandler => write!(f, "handler program must be set"),
            ValidationError::HandlerNotExecutable(p) => {
                write!(f, "handler program {} is not an executable file", p)
            }
            ValidationError::InvalidBindAddress(a) => write!(f, "invalid bind address {}", a),
            ValidationError::ZeroPort => write!(f, "port must be > 0"),
            ValidationError::ZeroReadChunk => write!(f, "read_chunk_size must be > 0"),
            ValidationError::RequestLimitTooSmall {
                max_request_size,
                required,
            } => write!(
                f,
                "max_request_size ({}) must be at least max_body_size + read_chunk_size + {} ({})",
                max_request_size, HEADER_ALLOWANCE, required
            ),
            ValidationError::ChunkExceedsRequestLimit {
                read_chunk_size,
                max_request_size,
            } => write!(
                f,
                "read_chunk_size ({}) must not exceed max_request_size ({})",
                read_chunk_size, max_request_size
            ),
            ValidationError::ZeroIdleTimeout => write!(f, "idle_secs must be > 0"),
            ValidationError::ZeroMaxConnections => write!(f, "max_connections must be > 0"),
            ValidationError::SpoolDirNotDirectory(p) => {
                write!(f, "spool directory {} is not a directory", p)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.handler.program.as_os_str().is_empty() {
        errors.push(ValidationError::MissingHandler);
    } else if !is_executable(&config.handler.program) {
        errors.push(ValidationError::HandlerNotExecutable(
            config.handler.program.display().to_string(),
        ));
    }

    if let Some(dir) = &config.handler.spool_dir {
        if !dir.is_dir() {
            errors.push(ValidationError::SpoolDirNotDirectory(dir.display().to_string()));
        }
    }

    if config.listener.socket_addr().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    let limits = &config.limits;
    if limits.read_chunk_size == 0 {
        errors.push(ValidationError::ZeroReadChunk);
    }
    if limits.read_chunk_size > limits.max_request_size {
        errors.push(ValidationError::ChunkExceedsRequestLimit {
            read_chunk_size: limits.read_chunk_size,
            max_request_size: limits.max_request_size,
        });
    }
    // The buffer refuses a read that could cross the ceiling, so a maximal
    // body needs a spare chunk on top of the headers.
    let required = limits.min_request_size();
    if limits.max_request_size < required {
        errors.push(ValidationError::RequestLimitTooSmall {
            max_request_size: limits.max_request_size,
            required,
        });
    }

    if config.timeouts.idle_secs == 0 {
        errors.push(ValidationError::ZeroIdleTimeout);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}
