//! Handler dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Completed request (parser verdict Done)
//!     → body.rs (stage body: REQBODY env var or anonymous spool file)
//!     → exec.rs (spawn handler: argv, env, stdin, socket as stdout)
//!     → handler writes the response, gateway waits for exit
//! ```
//!
//! # Design Decisions
//! - The client socket is moved into the handler; the gateway keeps no copy
//! - Spool files are unlinked at creation, so nothing is left on disk
//! - Spawn failures are never retried

pub mod body;
pub mod exec;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::http::response::Status;

pub use body::{stage_body, StagedBody};
pub use exec::{dispatch, BODY_ENV, HEADERS_ENV};

/// Errors that prevent a request from reaching its handler.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Creating or writing the spool file failed.
    #[error("spool file error: {0}")]
    Spool(#[source] std::io::Error),

    /// A spool write made no progress.
    #[error("spool write made no progress after {written} of {total} bytes")]
    SpoolStalled { written: usize, total: usize },

    /// A value passed to the handler contains a NUL byte.
    #[error("{0} contains a NUL byte")]
    NulByte(&'static str),

    /// The client socket could not be handed to the handler.
    #[error("socket hand-off failed: {0}")]
    Socket(#[source] std::io::Error),

    /// The handler program could not be started.
    #[error("failed to start handler: {0}")]
    Spawn(#[source] std::io::Error),

    /// Waiting for the handler failed.
    #[error("failed to wait for handler: {0}")]
    Wait(#[source] std::io::Error),
}

impl DispatchError {
    /// Status for the best-effort response sent when dispatch fails.
    pub fn status(&self) -> Status {
        match self {
            DispatchError::NulByte(_) => Status::BadRequest,
            _ => Status::InternalError,
        }
    }
}

/// A failed dispatch, handing back the client socket when it is still ours.
#[derive(Debug)]
pub struct DispatchFailure {
    pub error: DispatchError,
    pub stream: Option<TcpStream>,
}

impl DispatchFailure {
    pub(crate) fn new(error: DispatchError, stream: Option<TcpStream>) -> Self {
        Self { error, stream }
    }
}
