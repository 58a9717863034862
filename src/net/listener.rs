//! Listening socket with a bounded number of connection slots.
//!
//! # Responsibilities
//! - Bind the configured interface and port
//! - Hand out one slot per accepted connection, waiting when all are taken
//! - Stop handing out slots once closed, which ends the accept loop
//!
//! Accepted sockets are close-on-exec like every socket std and tokio open,
//! so handler processes never inherit the listener.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind: {0}")]
    Bind(#[source] std::io::Error),

    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// [`Listener::close`] was called; no further connections are admitted.
    #[error("listener closed")]
    Closed,
}

/// A connection the listener admitted, together with its slot.
#[derive(Debug)]
pub struct Accepted {
    pub stream: TcpStream,
    pub peer_addr: SocketAddr,
    pub slot: ConnectionSlot,
}

/// Occupies one connection slot until dropped.
///
/// The slot travels with the connection task, so it is released however the
/// task ends: normally, by panic, or torn down at the deadline.
#[derive(Debug)]
pub struct ConnectionSlot {
    _permit: OwnedSemaphorePermit,
}

pub struct Listener {
    socket: TcpListener,
    slots: Arc<Semaphore>,
}

impl Listener {
    /// Bind the configured address.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let addr = config.socket_addr().map_err(|e| {
            ListenerError::Bind(std::io::Error::new(std::io::ErrorKind::InvalidInput, e))
        })?;
        let socket = TcpListener::bind(addr).await.map_err(ListenerError::Bind)?;

        let local_addr = socket.local_addr().map_err(ListenerError::Bind)?;
        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "Listening"
        );
        Ok(Self::from_tcp(socket, config.max_connections))
    }

    /// Admit at most `max_connections` concurrent connections from `socket`.
    pub fn from_tcp(socket: TcpListener, max_connections: usize) -> Self {
        Self {
            socket,
            slots: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// Wait for a free slot, then for a connection to fill it.
    pub async fn accept(&self) -> Result<Accepted, ListenerError> {
        let slot = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, peer_addr) = self.socket.accept().await.map_err(ListenerError::Accept)?;
        tracing::trace!(%peer_addr, free_slots = self.slots.available_permits(), "Accepted");

        Ok(Accepted {
            stream,
            peer_addr,
            slot: ConnectionSlot { _permit: slot },
        })
    }

    /// Refuse further connections. Pending and later calls to
    /// [`Listener::accept`] fail with [`ListenerError::Closed`]; slots already
    /// handed out stay valid until their connections finish.
    pub fn close(&self) {
        self.slots.close();
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
