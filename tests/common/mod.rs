//! Shared utilities for relay integration tests.

#![allow(dead_code)]

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket as StdUdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::task::JoinHandle;

use mcast_relay::lifecycle::Shutdown;
use mcast_relay::net::{ConnectionTracker, Listener};
use mcast_relay::relay::ActiveSessions;
use mcast_relay::{RelayServer, ServerConfig};

/// Size of one sequence-numbered test datagram.
pub const RECORD_SIZE: usize = 64;

/// A relay running on an ephemeral loopback port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub sessions: ActiveSessions,
    pub connections: ConnectionTracker,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<io::Result<()>>,
}

impl TestRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a relay with the given idle timeout.
pub async fn start_relay(idle_timeout: Duration) -> TestRelay {
    let config = ServerConfig::new(
        "127.0.0.1:0".parse().unwrap(),
        Ipv4Addr::LOCALHOST,
        idle_timeout,
    );
    let listener = Listener::bind(config.listen, config.max_connections).unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = RelayServer::new(config, shutdown.clone());
    let sessions = server.sessions();
    let connections = server.connections();
    let handle = tokio::spawn(server.run(listener));

    TestRelay {
        addr,
        sessions,
        connections,
        shutdown,
        handle,
    }
}

/// UDP socket that sends to multicast groups and loops its own traffic back.
pub fn multicast_sender() -> io::Result<StdUdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_multicast_loop_v4(true)?;
    socket.set_multicast_ttl_v4(1)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
    Ok(socket.into())
}

/// True when this host can join `group` and receive its own looped traffic.
///
/// Containers without a multicast route fail here; callers skip.
pub fn multicast_available(group: SocketAddrV4) -> bool {
    let check = || -> io::Result<bool> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.bind(&SocketAddr::V4(group).into())?;
        socket.join_multicast_v4(group.ip(), &Ipv4Addr::UNSPECIFIED)?;
        socket.set_read_timeout(Some(Duration::from_millis(200)))?;
        let receiver: StdUdpSocket = socket.into();

        let sender = multicast_sender()?;
        let mut buf = [0u8; 16];
        for _ in 0..3 {
            sender.send_to(b"ping", group)?;
            if receiver.recv(&mut buf).is_ok() {
                return Ok(true);
            }
        }
        Ok(false)
    };

    match check() {
        Ok(true) => true,
        Ok(false) => {
            eprintln!("multicast loopback to {group} not delivered, skipping");
            false
        }
        Err(e) => {
            eprintln!("multicast unavailable for {group} ({e}), skipping");
            false
        }
    }
}

/// Fixed-size datagram carrying `seq` in its first eight bytes.
pub fn record(seq: u64) -> Vec<u8> {
    let mut payload = vec![seq as u8; RECORD_SIZE];
    payload[..8].copy_from_slice(&seq.to_be_bytes());
    payload
}

/// Sequence numbers of the complete records in `body`.
pub fn sequence_numbers(body: &[u8]) -> Vec<u64> {
    body.chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let mut seq = [0u8; 8];
            seq.copy_from_slice(&chunk[..8]);
            let seq = u64::from_be_bytes(seq);
            assert!(chunk[8..].iter().all(|b| *b == seq as u8), "corrupt record {seq}");
            seq
        })
        .collect()
}

/// True when every sequence number follows its predecessor.
pub fn is_contiguous(seqs: &[u64]) -> bool {
    seqs.windows(2).all(|pair| pair[1] == pair[0] + 1)
}

/// Background sender emitting `record(n)` for n = 0, 1, 2, ... until stopped.
pub struct Sender {
    stop: Arc<AtomicBool>,
    sent: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl Sender {
    pub fn spawn(group: SocketAddrV4, interval: Duration) -> Self {
        let socket = multicast_sender().unwrap();
        socket.set_nonblocking(true).unwrap();
        let socket = tokio::net::UdpSocket::from_std(socket).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let sent = Arc::new(AtomicU64::new(0));
        let handle = {
            let stop = Arc::clone(&stop);
            let sent = Arc::clone(&sent);
            tokio::spawn(async move {
                let mut seq = 0;
                while !stop.load(Ordering::SeqCst) {
                    if socket.send_to(&record(seq), group).await.is_ok() {
                        seq += 1;
                        sent.store(seq, Ordering::SeqCst);
                    }
                    tokio::time::sleep(interval).await;
                }
            })
        };

        Self { stop, sent, handle }
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    pub async fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.handle.await;
    }
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Read body chunks until at least `records` complete records arrived.
pub async fn read_records(response: &mut reqwest::Response, records: usize) -> Vec<u8> {
    let mut body = Vec::new();
    while body.len() < records * RECORD_SIZE {
        match response.chunk().await.unwrap() {
            Some(chunk) => body.extend_from_slice(&chunk),
            None => break,
        }
    }
    body
}
