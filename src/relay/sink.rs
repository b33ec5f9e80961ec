//! Response sinks for relayed payload.
//!
//! A sink receives the relay loop's output: the response head, payload
//! chunks, and a terminal error when no head was sent. [`ChannelSink`]
//! bridges the loop, which runs in its own task, to the axum handler that
//! owns the HTTP response.

use std::io;

use async_trait::async_trait;
use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::RelayError;
use crate::http::response::{error_response, stream_response};

/// Chunks buffered between the relay loop and hyper before writes block.
pub const SINK_DEPTH: usize = 32;

/// Destination of a relay loop.
#[async_trait]
pub trait ResponseSink: Send {
    /// Prepare the `200 OK` streaming head.
    async fn send_head(&mut self) -> io::Result<()>;

    /// Queue one payload chunk.
    async fn write(&mut self, chunk: Bytes) -> io::Result<()>;

    /// Push everything written so far, head included, to the client.
    async fn flush(&mut self) -> io::Result<()>;

    /// Answer with an error instead of a stream. No-op once a head was sent.
    async fn send_error(&mut self, error: &RelayError) -> io::Result<()>;
}

/// True for every error meaning the client went away.
pub fn is_client_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

fn client_gone() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected")
}

type Chunk = io::Result<Bytes>;

/// Sink that hands the response to a waiting handler over a oneshot and
/// streams the body through a bounded channel.
pub struct ChannelSink {
    reply: Option<oneshot::Sender<Response>>,
    pending: Option<Response>,
    tx: mpsc::Sender<Chunk>,
    rx: Option<mpsc::Receiver<Chunk>>,
}

impl ChannelSink {
    /// Create a sink and the receiver its response is delivered on.
    pub fn new(depth: usize) -> (Self, oneshot::Receiver<Response>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let (tx, rx) = mpsc::channel(depth.max(1));
        let sink = Self {
            reply: Some(reply_tx),
            pending: None,
            tx,
            rx: Some(rx),
        };
        (sink, reply_rx)
    }

    fn deliver(&mut self, response: Response) -> io::Result<()> {
        let reply = self
            .reply
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "response already delivered"))?;
        reply.send(response).map_err(|_| client_gone())
    }
}

#[async_trait]
impl ResponseSink for ChannelSink {
    async fn send_head(&mut self) -> io::Result<()> {
        let rx = self
            .rx
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "response head already sent"))?;
        let chunks = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|chunk| (chunk, rx))
        });
        self.pending = Some(stream_response(Body::from_stream(chunks)));
        Ok(())
    }

    async fn write(&mut self, chunk: Bytes) -> io::Result<()> {
        self.tx.send(Ok(chunk)).await.map_err(|_| client_gone())
    }

    async fn flush(&mut self) -> io::Result<()> {
        match self.pending.take() {
            Some(response) => self.deliver(response),
            None => Ok(()),
        }
    }

    async fn send_error(&mut self, error: &RelayError) -> io::Result<()> {
        if self.rx.is_none() {
            return Ok(());
        }
        self.deliver(error_response(error.status(), &error.reason()))
    }
}
