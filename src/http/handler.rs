//! Per-connection request handling.
//!
//! # Responsibilities
//! - Read the request in chunks into a growable buffer
//! - Drive the parser and enforce size limits and the idle timeout
//! - Answer malformed or unsupported requests with a synthesized response
//! - Hand completed requests to the dispatcher
//!
//! # Lifecycle
//! ```text
//! accepted → reading/parsing (0..N) → Dispatched | Rejected | Idle | Aborted
//! ```
//! Exactly one terminal outcome per connection. The hard deadline is applied
//! around this whole function by the server.

use std::process::ExitStatus;

use tokio::net::TcpStream;

use crate::config::GatewayConfig;
use crate::dispatch::{dispatch, stage_body, DispatchError, DispatchFailure};
use crate::http::buffer::GrowableBuffer;
use crate::http::parser::{RequestParser, Verdict};
use crate::http::response::{send_message, Status};
use crate::net::connection::ConnectionId;

/// How a connection ended.
#[derive(Debug)]
pub enum Outcome {
    /// The handler ran and exited with this status.
    Dispatched(ExitStatus),
    /// The gateway answered with its own response.
    Rejected(Status),
    /// The client sent nothing before the idle timeout; closed silently.
    Idle,
    /// The connection failed and no response could be sent.
    Aborted,
}

/// Handle one accepted connection from first byte to terminal outcome.
pub async fn handle_connection(
    mut stream: TcpStream,
    id: ConnectionId,
    config: &GatewayConfig,
) -> Outcome {
    let limits = &config.limits;
    let mut buffer = GrowableBuffer::new(limits.read_chunk_size, limits.max_request_size);
    let mut parser = RequestParser::new(limits.max_body_size);

    // With a hard deadline armed, only the wait for the first byte is
    // bounded by the idle timeout.
    let always_bounded = config.timeouts.deadline().is_none();

    loop {
        if buffer.reserve_chunk().is_err() {
            return reject(&mut stream, id, Status::BadRequest, "Request too large").await;
        }

        let bounded = always_bounded || buffer.is_empty();
        let read = if bounded {
            match tokio::time::timeout(config.timeouts.idle(), buffer.read_chunk(&mut stream)).await {
                Ok(read) => read,
                Err(_) => {
                    tracing::debug!(
                        connection_id = %id,
                        received = buffer.len(),
                        "Idle timeout, closing"
                    );
                    return Outcome::Idle;
                }
            }
        } else {
            buffer.read_chunk(&mut stream).await
        };

        let bytes = match read {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(connection_id = %id, error = %e, "Read failed");
                return Outcome::Aborted;
            }
        };

        match parser.parse(buffer.filled()) {
            Verdict::More if bytes == 0 => {
                return reject(&mut stream, id, Status::BadRequest, "Expected more data").await;
            }
            Verdict::More => continue,
            Verdict::Done => {
                return dispatch_request(stream, id, &parser, buffer.filled(), config).await;
            }
            Verdict::Error(e) => {
                let message = format!("Bad request: {}", e);
                return reject(&mut stream, id, Status::BadRequest, &message).await;
            }
            Verdict::NotImplemented => {
                return reject(&mut stream, id, Status::NotImplemented, "Not implemented").await;
            }
        }
    }
}

async fn dispatch_request(
    mut stream: TcpStream,
    id: ConnectionId,
    parser: &RequestParser,
    buf: &[u8],
    config: &GatewayConfig,
) -> Outcome {
    let Some(request) = parser.request(buf) else {
        return reject(&mut stream, id, Status::InternalError, "Error").await;
    };

    tracing::info!(
        connection_id = %id,
        method = %request.method,
        path = %String::from_utf8_lossy(request.path),
        version = request.version.as_str(),
        body_bytes = request.body.len(),
        "Executing handler"
    );

    let staged = match stage_body(request.body, config.handler.spool_dir.as_deref()).await {
        Ok(staged) => staged,
        Err(error) => {
            tracing::error!(connection_id = %id, %error, "Body staging failed");
            return reject(&mut stream, id, error.status(), &failure_message(&error)).await;
        }
    };

    match dispatch(&config.handler, &request, staged, stream).await {
        Ok(status) => {
            tracing::debug!(connection_id = %id, %status, "Handler exited");
            Outcome::Dispatched(status)
        }
        Err(DispatchFailure { error, stream }) => {
            tracing::error!(connection_id = %id, %error, "Dispatch failed");
            match stream {
                Some(mut stream) => {
                    reject(&mut stream, id, error.status(), &failure_message(&error)).await
                }
                None => Outcome::Aborted,
            }
        }
    }
}

/// Client-facing text for a dispatch failure; internal details stay in the log.
fn failure_message(error: &DispatchError) -> String {
    match error.status() {
        Status::BadRequest => format!("Bad request: {}", error),
        _ => "Error".to_string(),
    }
}

async fn reject(stream: &mut TcpStream, id: ConnectionId, status: Status, message: &str) -> Outcome {
    tracing::info!(connection_id = %id, %status, reason = message, "Rejected");
    if let Err(e) = send_message(stream, status, message).await {
        tracing::debug!(connection_id = %id, error = %e, "Failed to send response");
    }
    Outcome::Rejected(status)
}
