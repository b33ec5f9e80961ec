//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Apply CLI overrides → Validate → Discover source IP
//!     → ServerConfig → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → End relay loops → Drain connections
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Relay loops observe shutdown directly so sockets are released before
//!   connections drain

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::{discover_source_ip, resolve_server_config, StartupError};
