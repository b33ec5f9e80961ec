//! Multicast group membership and datagram reads.
//!
//! # Responsibilities
//! - Open a UDP socket bound to the requested group and port
//! - Join the group and pick the outbound multicast interface
//! - Read whole datagrams with an idle timeout
//! - Release the socket exactly once, on every exit path
//!
//! # Design Decisions
//! - Sockets are built with `socket2` so the options are set before the
//!   socket is handed to tokio
//! - `MulticastSession` closes itself on drop; an explicit `close()` is
//!   idempotent so the relay loop can release early and log it
//! - A timed-out read is a normal outcome, not an error

use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::observability::metrics;
use crate::relay::address::GroupAddress;

/// Largest possible UDP payload; datagrams are never truncated.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Result of a single read from a datagram source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One complete datagram payload.
    Datagram(Bytes),
    /// No datagram arrived within the idle timeout.
    Timeout,
}

/// Something the relay loop can pull datagrams from.
#[async_trait]
pub trait DatagramSource: Send {
    /// Wait for the next datagram, up to the idle timeout.
    async fn read(&mut self) -> io::Result<ReadOutcome>;

    /// How long a single read waits before reporting `Timeout`.
    fn idle_timeout(&self) -> Duration;

    /// When the source started listening; time to first byte counts from here.
    fn opened_at(&self) -> Instant;

    /// Release the underlying resources. Must be idempotent.
    fn close(&mut self);
}

/// Per-session socket parameters, fixed at startup.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Interface address multicast traffic originates from.
    pub source_ip: Ipv4Addr,
    /// Maximum wait for the next datagram.
    pub idle_timeout: Duration,
    /// Receive buffer per read.
    pub read_buffer_size: usize,
}

/// Counts multicast sessions that are currently open.
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    count: Arc<AtomicUsize>,
}

impl ActiveSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions whose socket is still open.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    fn enter(&self) -> SessionSlot {
        self.count.fetch_add(1, Ordering::SeqCst);
        metrics::session_opened();
        SessionSlot {
            count: Arc::clone(&self.count),
        }
    }
}

/// Held by an open session; decrements the active count when dropped.
#[derive(Debug)]
struct SessionSlot {
    count: Arc<AtomicUsize>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
        metrics::session_closed();
    }
}

/// One joined multicast group, owned by a single request.
#[derive(Debug)]
pub struct MulticastSession {
    socket: Option<UdpSocket>,
    group: GroupAddress,
    idle_timeout: Duration,
    buf: Vec<u8>,
    opened_at: Instant,
    slot: Option<SessionSlot>,
}

impl MulticastSession {
    /// Bind to `group`, join it, and prepare for timed reads.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        group: GroupAddress,
        settings: &SessionSettings,
        sessions: &ActiveSessions,
    ) -> io::Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&group.socket_addr().into())?;

        // Outbound interface for multicast; membership below uses INADDR_ANY.
        socket.set_multicast_if_v4(&settings.source_ip)?;
        socket.join_multicast_v4(&group.ip(), &Ipv4Addr::UNSPECIFIED)?;

        socket.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(socket.into())?;

        tracing::debug!(
            group = %group,
            source_ip = %settings.source_ip,
            idle_timeout_ms = settings.idle_timeout.as_millis() as u64,
            "Joined multicast group"
        );

        Ok(Self {
            socket: Some(socket),
            group,
            idle_timeout: settings.idle_timeout,
            buf: vec![0; settings.read_buffer_size.clamp(1, MAX_DATAGRAM_SIZE)],
            opened_at: Instant::now(),
            slot: Some(sessions.enter()),
        })
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Leave the group and close the socket. Safe to call more than once.
    pub fn close(&mut self) {
        let Some(socket) = self.socket.take() else {
            return;
        };
        if let Err(e) = socket.leave_multicast_v4(self.group.ip(), Ipv4Addr::UNSPECIFIED) {
            tracing::debug!(group = %self.group, error = %e, "Leaving multicast group failed");
        }
        drop(socket);
        self.slot.take();
        tracing::debug!(group = %self.group, "Multicast session closed");
    }
}

#[async_trait]
impl DatagramSource for MulticastSession {
    async fn read(&mut self) -> io::Result<ReadOutcome> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "multicast session closed"))?;

        match tokio::time::timeout(self.idle_timeout, socket.recv(&mut self.buf)).await {
            Ok(Ok(len)) => Ok(ReadOutcome::Datagram(Bytes::copy_from_slice(&self.buf[..len]))),
            Ok(Err(e)) => Err(e),
            Err(_) => Ok(ReadOutcome::Timeout),
        }
    }

    fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn opened_at(&self) -> Instant {
        self.opened_at
    }

    fn close(&mut self) {
        MulticastSession::close(self)
    }
}

impl Drop for MulticastSession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddrV4;

    fn settings(idle_ms: u64) -> SessionSettings {
        SessionSettings {
            source_ip: Ipv4Addr::LOCALHOST,
            idle_timeout: Duration::from_millis(idle_ms),
            read_buffer_size: MAX_DATAGRAM_SIZE,
        }
    }

    fn group(port: u16) -> GroupAddress {
        GroupAddress::new(Ipv4Addr::new(239, 255, 77, 1), port).unwrap()
    }

    /// Joining needs a multicast-capable interface; sandboxes often lack one.
    fn try_open(port: u16, idle_ms: u64, sessions: &ActiveSessions) -> Option<MulticastSession> {
        match MulticastSession::open(group(port), &settings(idle_ms), sessions) {
            Ok(session) => Some(session),
            Err(e) => {
                eprintln!("skipping: cannot join multicast group: {e}");
                None
            }
        }
    }

    #[test]
    fn active_sessions_starts_empty() {
        assert_eq!(ActiveSessions::new().count(), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_releases_slot() {
        let sessions = ActiveSessions::new();
        let Some(mut session) = try_open(42_001, 50, &sessions) else {
            return;
        };
        assert!(session.is_open());
        assert_eq!(sessions.count(), 1);

        session.close();
        session.close();
        assert!(!session.is_open());
        assert_eq!(sessions.count(), 0);

        let err = session.read().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[tokio::test]
    async fn drop_releases_slot_across_cycles() {
        let sessions = ActiveSessions::new();
        for _ in 0..20 {
            let Some(session) = try_open(42_002, 50, &sessions) else {
                return;
            };
            assert_eq!(sessions.count(), 1);
            drop(session);
            assert_eq!(sessions.count(), 0);
        }
    }

    #[tokio::test]
    async fn silent_group_times_out() {
        let sessions = ActiveSessions::new();
        let Some(mut session) = try_open(42_003, 100, &sessions) else {
            return;
        };
        let started = Instant::now();
        assert_eq!(session.read().await.unwrap(), ReadOutcome::Timeout);
        assert!(started.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn reads_whole_datagrams_in_order() {
        let sessions = ActiveSessions::new();
        let Some(mut session) = try_open(42_004, 1_000, &sessions) else {
            return;
        };

        let sender = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        sender.set_multicast_loop_v4(true).unwrap();
        let target = SocketAddrV4::new(group(42_004).ip(), 42_004);
        let big = vec![7u8; 9_000];
        sender.send_to(b"first", target).unwrap();
        sender.send_to(&big, target).unwrap();

        match session.read().await.unwrap() {
            ReadOutcome::Datagram(data) => assert_eq!(&data[..], b"first"),
            ReadOutcome::Timeout => {
                eprintln!("skipping: multicast loopback not delivered");
                return;
            }
        }
        assert_eq!(session.read().await.unwrap(), ReadOutcome::Datagram(Bytes::from(big)));
    }
}
