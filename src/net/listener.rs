//! TCP listener implementation with backpressure.
//!
//! # Responsibilities
//! - Bind to the configured IPv4 or IPv6 address with address reuse
//! - Accept incoming TCP connections
//! - Enforce max_connections limit via semaphore
//! - Apply low-latency hints to every accepted connection

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use socket2::SockRef;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// IPTOS_LOWDELAY.
pub const LOW_DELAY_TOS: u32 = 0x10;

const LISTEN_BACKLOG: u32 = 1024;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] io::Error),
    /// The connection limiter was shut down.
    #[error("Listener closed")]
    Closed,
}

/// A bounded TCP listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections wait in the kernel backlog until a slot becomes available.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Listener {
    /// Bind to `addr`; the address family follows `addr`.
    pub fn bind(addr: SocketAddr, max_connections: usize) -> Result<Self, ListenerError> {
        let bind_failed = |source: io::Error| ListenerError::Bind { addr, source };

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_failed)?;
        socket.set_reuseaddr(true).map_err(bind_failed)?;
        socket.bind(addr).map_err(bind_failed)?;
        let inner = socket.listen(LISTEN_BACKLOG).map_err(bind_failed)?;

        let local_addr = inner.local_addr().map_err(bind_failed)?;
        tracing::info!(
            address = %local_addr,
            max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections.max(1))),
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// Returns the stream and a permit that must be held for the
    /// connection's lifetime.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = Arc::clone(&self.connection_limit)
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        set_low_latency(&stream);

        tracing::debug!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }
}

/// Disable Nagle and mark traffic low-delay. Failures are only logged.
pub fn set_low_latency(stream: &TcpStream) {
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!(error = %e, "TCP_NODELAY not applied");
    }
    let is_v4 = stream.local_addr().map(|a| a.is_ipv4()).unwrap_or(false);
    if is_v4 {
        if let Err(e) = SockRef::from(stream).set_tos(LOW_DELAY_TOS) {
            tracing::debug!(error = %e, "IP_TOS not applied");
        }
    }
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released, even if the connection
/// task panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}
