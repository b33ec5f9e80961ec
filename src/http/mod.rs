//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (net::Listener)
//!     → server.rs (hyper http1 connection, axum Router, middleware)
//!     → request.rs (request ID for log correlation)
//!     → relay::path (group address) → relay::stream (payload)
//!     → response.rs (stream head or plain-text error)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{AppState, RelayServer, SERVER_NAME};
