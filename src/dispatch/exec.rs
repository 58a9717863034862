//! Handler program execution.
//!
//! The handler is started as
//! ```text
//! <program> <METHOD> <PATH>
//!     env   REQHEADERS=<raw header block>
//!           REQBODY=<body>            (environment strategy, non-empty body)
//!     stdin /dev/null or the spooled body at offset 0
//!     stdout the client socket
//!     stderr inherited from the gateway
//! ```
//! The child inherits nothing else: every descriptor the gateway opens,
//! the listening socket included, is close-on-exec.

use std::ffi::OsStr;
use std::os::fd::OwnedFd;
use std::os::unix::ffi::OsStrExt;
use std::process::{ExitStatus, Stdio};

use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::config::HandlerConfig;
use crate::dispatch::body::StagedBody;
use crate::dispatch::{DispatchError, DispatchFailure};
use crate::http::parser::ParsedRequest;

/// Environment variable holding the raw header block.
pub const HEADERS_ENV: &str = "REQHEADERS";

/// Environment variable holding the body in the environment strategy.
pub const BODY_ENV: &str = "REQBODY";

/// Start the handler for `request` with `stream` as its stdout and wait for it.
///
/// The socket is handed over on a successful spawn. When the handler cannot
/// be started, the socket comes back in the failure so the caller can still
/// answer the client. Dropping the returned future kills the handler.
pub async fn dispatch(
    handler: &HandlerConfig,
    request: &ParsedRequest<'_>,
    body: StagedBody<'_>,
    stream: TcpStream,
) -> Result<ExitStatus, DispatchFailure> {
    if let Err(error) = check_representable(request) {
        return Err(DispatchFailure::new(error, Some(stream)));
    }

    let socket = stream
        .into_std()
        .map_err(|e| DispatchFailure::new(DispatchError::Socket(e), None))?;

    let mut child = match spawn(handler, request, body, &socket) {
        Ok(child) => child,
        Err(error) => return Err(DispatchFailure::new(error, reclaim(socket))),
    };
    // The handler now owns the only live copy of the socket.
    drop(socket);

    tracing::debug!(pid = child.id(), "Handler started");

    child
        .wait()
        .await
        .map_err(|e| DispatchFailure::new(DispatchError::Wait(e), None))
}

fn check_representable(request: &ParsedRequest<'_>) -> Result<(), DispatchError> {
    if request.path.contains(&0) {
        return Err(DispatchError::NulByte("request path"));
    }
    if request.headers_raw.contains(&0) {
        return Err(DispatchError::NulByte(HEADERS_ENV));
    }
    Ok(())
}

fn spawn(
    handler: &HandlerConfig,
    request: &ParsedRequest<'_>,
    body: StagedBody<'_>,
    socket: &std::net::TcpStream,
) -> Result<Child, DispatchError> {
    // The handler writes with plain blocking I/O.
    socket.set_nonblocking(false).map_err(DispatchError::Socket)?;
    let stdout = socket.try_clone().map_err(DispatchError::Socket)?;

    let mut command = Command::new(&handler.program);
    command
        .arg(request.method.as_str())
        .arg(OsStr::from_bytes(request.path))
        .env(HEADERS_ENV, OsStr::from_bytes(request.headers_raw))
        .env_remove(BODY_ENV)
        .stdout(Stdio::from(OwnedFd::from(stdout)))
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    match body {
        StagedBody::Empty => {
            command.stdin(Stdio::null());
        }
        StagedBody::Environment(bytes) => {
            command.env(BODY_ENV, OsStr::from_bytes(bytes)).stdin(Stdio::null());
        }
        StagedBody::Spooled(file) => {
            command.stdin(Stdio::from(file));
        }
    }

    command.spawn().map_err(DispatchError::Spawn)
}

fn reclaim(socket: std::net::TcpStream) -> Option<TcpStream> {
    socket.set_nonblocking(true).ok()?;
    TcpStream::from_std(socket).ok()
}
