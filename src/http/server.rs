//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the axum Router and wire up middleware (tracing, request ID,
//!   Server header)
//! - Run the accept loop over [`Listener`], one task per connection
//! - Validate request paths and start one relay loop per streaming request
//! - Stop accepting, end relay loops and drain connections on shutdown
//!
//! # Design Decisions
//! - Connections are served with hyper directly instead of `axum::serve` so
//!   that the listener can set per-connection socket options
//! - Path validation runs before the method check: `/` is forbidden for
//!   every method

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, State};
use axum::http::header::{HeaderValue, SERVER};
use axum::http::{HeaderMap, Method, Request, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tower::ServiceExt;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::error::RelayError;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::http::response::head_response;
use crate::lifecycle::{Shutdown, ShutdownSignal};
use crate::net::listener::ConnectionPermit;
use crate::net::{ConnectionGuard, ConnectionTracker, Listener, ListenerError};
use crate::observability::{logging, metrics};
use crate::relay::sink::SINK_DEPTH;
use crate::relay::{
    parse_request_path, ActiveSessions, ChannelSink, GroupAddress, MulticastSession, RelayStream,
};

/// Value of the `Server` response header.
pub const SERVER_NAME: &str = concat!("mcast-relay/", env!("CARGO_PKG_VERSION"));

const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(30);
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub sessions: ActiveSessions,
    pub shutdown: Shutdown,
}

/// HTTP front end of the relay.
pub struct RelayServer {
    router: Router,
    state: AppState,
    connections: ConnectionTracker,
}

impl RelayServer {
    pub fn new(config: ServerConfig, shutdown: Shutdown) -> Self {
        let state = AppState {
            config: Arc::new(config),
            sessions: ActiveSessions::new(),
            shutdown,
        };
        let router = Self::build_router(state.clone());
        Self {
            router,
            state,
            connections: ConnectionTracker::new(),
        }
    }

    /// Build the axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", any(relay_handler))
            .route("/{*path}", any(relay_handler))
            .with_state(state)
            .layer(SetResponseHeaderLayer::if_not_present(
                SERVER,
                HeaderValue::from_static(SERVER_NAME),
            ))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
    }

    /// The request router. Handlers expect a `ConnectInfo<SocketAddr>`
    /// request extension.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Handle on the count of joined multicast groups.
    pub fn sessions(&self) -> ActiveSessions {
        self.state.sessions.clone()
    }

    /// Handle on the count of open client connections.
    pub fn connections(&self) -> ConnectionTracker {
        self.connections.clone()
    }

    /// Accept connections until shutdown, then drain.
    pub async fn run(self, listener: Listener) -> io::Result<()> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            source_ip = %self.state.config.source_ip,
            idle_timeout_ms = self.state.config.idle_timeout.as_millis() as u64,
            "HTTP server starting"
        );

        let mut shutdown_rx = self.state.shutdown.subscribe();
        loop {
            let accepted = tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = listener.accept() => accepted,
            };
            let (stream, peer, permit) = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Closed) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    continue;
                }
            };

            let guard = self.connections.track();
            tokio::spawn(serve_connection(
                stream,
                peer,
                self.router.clone(),
                self.state.shutdown.subscribe(),
                guard,
                permit,
            ));
        }

        tracing::info!(
            active_connections = self.connections.active_count(),
            "HTTP server stopped accepting, draining"
        );
        if !self.connections.drain(DRAIN_TIMEOUT).await {
            tracing::warn!(
                active_connections = self.connections.active_count(),
                "Drain timed out"
            );
        }
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Serve one client connection until it closes or the server shuts down.
async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Router,
    mut shutdown: ShutdownSignal,
    guard: ConnectionGuard,
    _permit: ConnectionPermit,
) {
    let service = hyper::service::service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(ConnectInfo(peer));
        router.clone().oneshot(request)
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(HEADER_READ_TIMEOUT)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let result = tokio::select! {
        result = conn.as_mut() => result,
        _ = shutdown.recv() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = result {
        tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection ended with error");
    }
}

/// Entry point for every request.
async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let request_id = request_id(&headers);
    tracing::info!(client = %peer, path = %uri.path(), request_id, "Client requested path");

    let response = match dispatch(&state, peer, &method, uri.path()).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                RelayError::Socket(_) => {
                    logging::report_error(state.config.debug, "Multicast session setup failed", &err)
                }
                _ => tracing::info!(client = %peer, request_id, error = %err, "Request rejected"),
            }
            err.into_response()
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16());
    response
}

async fn dispatch(
    state: &AppState,
    peer: SocketAddr,
    method: &Method,
    path: &str,
) -> Result<Response, RelayError> {
    let group = parse_request_path(path)?;

    if method == Method::GET {
        start_relay(state, peer, group).await
    } else if method == Method::HEAD {
        Ok(head_response())
    } else {
        Err(RelayError::MethodNotAllowed(method.clone()))
    }
}

/// Join `group` and hand the stream to a relay task. Resolves once the
/// relay produced either the response head or an error response.
async fn start_relay(
    state: &AppState,
    peer: SocketAddr,
    group: GroupAddress,
) -> Result<Response, RelayError> {
    let session = MulticastSession::open(group, &state.config.session_settings(), &state.sessions)
        .map_err(RelayError::Socket)?;

    let (sink, reply) = ChannelSink::new(SINK_DEPTH);
    let relay = RelayStream::new(session, sink, group, peer)
        .with_shutdown(state.shutdown.subscribe())
        .with_debug(state.config.debug);
    tokio::spawn(relay.run());

    reply.await.map_err(|_| RelayError::ShuttingDown)
}
