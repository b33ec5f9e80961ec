//! The read/forward relay loop.
//!
//! # State Machine
//! ```text
//! AwaitingFirstDatagram ──datagram──▶ Streaming ──datagram──▶ Streaming
//!        │                               │
//!        │ timeout: 404 to client         │ timeout: graceful end
//!        │ socket error: 500              │ client gone / error
//!        ▼                               ▼
//!       Done ◀──────── shutdown ─────────┘
//! ```
//!
//! # Design Decisions
//! - A timeout before the first byte means the group never became active
//!   and is reported to the client; after the first byte it means the feed
//!   went quiet and ends the stream normally
//! - The head and first payload are flushed together so the client sees
//!   data as soon as the group does
//! - The source is closed when the loop reaches `Done`, whatever the cause

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;
use crate::error::RelayError;
use crate::lifecycle::ShutdownSignal;
use crate::observability::{logging, metrics};
use crate::relay::address::GroupAddress;
use crate::relay::multicast::{DatagramSource, ReadOutcome};
use crate::relay::sink::{is_client_disconnect, ResponseSink};

/// Where the relay loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    AwaitingFirstDatagram,
    Streaming,
    Done,
}

/// How a relay loop ended.
#[derive(Debug)]
pub enum RelayOutcome {
    /// Data was relayed and the group then went idle.
    Completed,
    /// The client closed the connection.
    ClientDisconnected,
    /// Nothing arrived before the first idle timeout.
    NoData,
    /// The server shut down mid-relay.
    Interrupted,
    /// A socket or write error ended the relay.
    Failed(RelayError),
}

impl RelayOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayOutcome::Completed => "completed",
            RelayOutcome::ClientDisconnected => "client_disconnected",
            RelayOutcome::NoData => "no_data",
            RelayOutcome::Interrupted => "interrupted",
            RelayOutcome::Failed(_) => "failed",
        }
    }
}

/// Summary of one finished relay loop.
#[derive(Debug)]
pub struct RelayReport {
    pub outcome: RelayOutcome,
    pub bytes: u64,
    pub duration: Duration,
    pub ttfb: Option<Duration>,
}

enum Next {
    Read(io::Result<ReadOutcome>),
    Shutdown,
}

/// Pumps datagrams from a source into a response sink.
pub struct RelayStream<S, K> {
    source: S,
    sink: K,
    group: GroupAddress,
    client: SocketAddr,
    state: RelayState,
    started: Instant,
    bytes: u64,
    ttfb: Option<Duration>,
    shutdown: Option<ShutdownSignal>,
    debug: bool,
}

impl<S, K> RelayStream<S, K>
where
    S: DatagramSource,
    K: ResponseSink,
{
    pub fn new(source: S, sink: K, group: GroupAddress, client: SocketAddr) -> Self {
        Self {
            source,
            sink,
            group,
            client,
            state: RelayState::AwaitingFirstDatagram,
            started: Instant::now(),
            bytes: 0,
            ttfb: None,
            shutdown: None,
            debug: false,
        }
    }

    /// End the loop when the server shuts down.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Log unexpected errors with full detail.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// Drive the loop to `Done` and release the source.
    pub async fn run(mut self) -> RelayReport {
        let outcome = loop {
            if let Some(outcome) = self.step().await {
                break outcome;
            }
        };
        self.finish(outcome)
    }

    /// Perform one transition. Returns the outcome once `Done` is reached.
    pub async fn step(&mut self) -> Option<RelayOutcome> {
        let outcome = match self.state {
            RelayState::Done => return Some(RelayOutcome::Interrupted),
            RelayState::AwaitingFirstDatagram => self.await_first().await,
            RelayState::Streaming => self.stream_next().await,
        };
        if outcome.is_some() {
            self.state = RelayState::Done;
            self.source.close();
        }
        outcome
    }

    async fn next(&mut self) -> Next {
        match self.shutdown.as_mut() {
            Some(shutdown) => tokio::select! {
                read = self.source.read() => Next::Read(read),
                _ = shutdown.recv() => Next::Shutdown,
            },
            None => Next::Read(self.source.read().await),
        }
    }

    async fn await_first(&mut self) -> Option<RelayOutcome> {
        match self.next().await {
            Next::Read(Ok(ReadOutcome::Datagram(payload))) => {
                let ttfb = self.source.opened_at().elapsed();
                self.ttfb = Some(ttfb);
                metrics::record_ttfb(ttfb);
                tracing::info!(
                    group = %self.group,
                    ttfb_ms = ttfb.as_secs_f64() * 1e3,
                    "First datagram received"
                );

                let len = payload.len() as u64;
                match self.open_stream(payload).await {
                    Ok(()) => {
                        self.bytes += len;
                        self.state = RelayState::Streaming;
                        None
                    }
                    Err(e) => Some(self.write_failed(e)),
                }
            }
            Next::Read(Ok(ReadOutcome::Timeout)) => {
                let waited = self.source.idle_timeout();
                tracing::info!(
                    group = %self.group,
                    elapsed_secs = self.started.elapsed().as_secs_f64(),
                    "Read timeout before first datagram"
                );
                self.reply_error(&RelayError::NoData(waited)).await;
                Some(RelayOutcome::NoData)
            }
            Next::Read(Err(e)) => {
                let err = RelayError::Socket(e);
                logging::report_error(self.debug, "Multicast read failed", &err);
                self.reply_error(&err).await;
                Some(RelayOutcome::Failed(err))
            }
            Next::Shutdown => {
                self.reply_error(&RelayError::ShuttingDown).await;
                Some(RelayOutcome::Interrupted)
            }
        }
    }

    async fn stream_next(&mut self) -> Option<RelayOutcome> {
        match self.next().await {
            Next::Read(Ok(ReadOutcome::Datagram(payload))) => self.forward(payload).await,
            Next::Read(Ok(ReadOutcome::Timeout)) => {
                tracing::info!(
                    group = %self.group,
                    elapsed_secs = self.started.elapsed().as_secs_f64(),
                    "Read timeout, ending stream"
                );
                Some(RelayOutcome::Completed)
            }
            Next::Read(Err(e)) => {
                let err = RelayError::Socket(e);
                logging::report_error(self.debug, "Multicast read failed", &err);
                Some(RelayOutcome::Failed(err))
            }
            Next::Shutdown => Some(RelayOutcome::Interrupted),
        }
    }

    /// Head, first payload, flush: the client sees the first byte now.
    async fn open_stream(&mut self, payload: Bytes) -> io::Result<()> {
        self.sink.send_head().await?;
        self.sink.write(payload).await?;
        self.sink.flush().await
    }

    async fn forward(&mut self, payload: Bytes) -> Option<RelayOutcome> {
        let len = payload.len() as u64;
        match self.sink.write(payload).await {
            Ok(()) => {
                self.bytes += len;
                None
            }
            Err(e) => Some(self.write_failed(e)),
        }
    }

    fn write_failed(&self, e: io::Error) -> RelayOutcome {
        if is_client_disconnect(&e) {
            tracing::debug!(client = %self.client, group = %self.group, error = %e, "Client disconnected");
            return RelayOutcome::ClientDisconnected;
        }
        let err = RelayError::ClientWrite(e);
        logging::report_error(self.debug, "Client write failed", &err);
        RelayOutcome::Failed(err)
    }

    async fn reply_error(&mut self, err: &RelayError) {
        if let Err(e) = self.sink.send_error(err).await {
            tracing::debug!(client = %self.client, error = %e, "Client gone before error reply");
        }
    }

    fn finish(mut self, outcome: RelayOutcome) -> RelayReport {
        self.state = RelayState::Done;
        self.source.close();

        let duration = self.started.elapsed();
        metrics::record_relay_finished(outcome.as_str(), self.bytes, duration);
        tracing::info!(
            client = %self.client.ip(),
            group = %self.group,
            bytes = self.bytes,
            duration_secs = duration.as_secs_f64(),
            outcome = outcome.as_str(),
            "Relay finished"
        );

        RelayReport {
            outcome,
            bytes: self.bytes,
            duration,
            ttfb: self.ttfb,
        }
    }
}
