//! Responses synthesized by the gateway itself.
//!
//! # Responsibilities
//! - Format minimal `text/plain` responses for rejected requests
//! - Write them with a bounded number of would-block retries
//! - Linger briefly so unread request bytes do not turn the close into a reset
//!
//! # Design Decisions
//! - Successful requests never pass through here; the handler program
//!   writes its own response straight to the socket
//! - The status line carries only the code, no reason phrase

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::resilience::BoundedRetry;

const SEND_ATTEMPTS: u32 = 3;
const SEND_RETRY_BASE_MS: u64 = 250;
const SEND_RETRY_MAX_MS: u64 = 1000;

const LINGER_TIMEOUT: Duration = Duration::from_millis(500);
const LINGER_MAX_BYTES: usize = 64 * 1024;

/// Status codes the gateway emits on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    InternalError,
    NotImplemented,
}

impl Status {
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::InternalError => 500,
            Status::NotImplemented => 501,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Render a complete response. The declared length covers the trailing CRLF.
pub fn format_message(status: Status, message: &str) -> Vec<u8> {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\n\r\n{}\r\n",
        status.code(),
        message.len() + 2,
        message
    )
    .into_bytes()
}

/// Write a synthesized response and close our sending side.
pub async fn send_message(
    stream: &mut TcpStream,
    status: Status,
    message: &str,
) -> std::io::Result<()> {
    let response = format_message(status, message);
    let mut retry = BoundedRetry::new(SEND_ATTEMPTS, SEND_RETRY_BASE_MS, SEND_RETRY_MAX_MS);
    let mut written = 0;

    while written < response.len() {
        match stream.try_write(&response[written..]) {
            Ok(0) => return Err(std::io::ErrorKind::WriteZero.into()),
            Ok(n) => written += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                let Some(delay) = retry.next_delay() else {
                    return Err(e);
                };
                let _ = tokio::time::timeout(delay, stream.writable()).await;
            }
            Err(e) => return Err(e),
        }
    }

    stream.shutdown().await?;
    linger(stream).await;
    Ok(())
}

/// Discard what the client is still sending until it closes, briefly.
async fn linger(stream: &mut TcpStream) {
    let mut scratch = [0u8; 1024];
    let mut discarded = 0;
    let _ = tokio::time::timeout(LINGER_TIMEOUT, async {
        while discarded < LINGER_MAX_BYTES {
            match stream.read(&mut scratch).await {
                Ok(0) | Err(_) => break,
                Ok(n) => discarded += n,
            }
        }
    })
    .await;
}
