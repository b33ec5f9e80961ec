//! HTTP relay for IPv4 multicast streams.
//!
//! A client asks for `/<group>` or `/<group>/<port>`; the relay joins the
//! group and streams every datagram payload back as one unbounded
//! `application/octet-stream` body until the group goes quiet, the client
//! leaves, or the server shuts down.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod relay;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::{RelayConfig, ServerConfig};
pub use error::RelayError;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
pub use net::Listener;
