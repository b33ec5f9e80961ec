//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! relay / http / net:
//!     → logging.rs (structured log events, debug-aware error reports)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Group address and client address travel as structured fields
//! - Metrics are cheap and recorded unconditionally; exposition is opt-in

pub mod logging;
pub mod metrics;
