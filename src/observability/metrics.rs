//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define relay metrics (requests, sessions, throughput, latency)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `relay_requests_total` (counter): requests by method and status
//! - `relay_sessions_active` (gauge): joined multicast sockets
//! - `relay_connections_active` (gauge): open client connections
//! - `relay_ttfb_seconds` (histogram): time to first relayed byte
//! - `relay_bytes_total` (counter): payload bytes written to clients
//! - `relay_session_duration_seconds` (histogram): relay loop lifetime
//! - `relay_outcomes_total` (counter): how relay loops ended
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users
//!   and tests pay nothing
//! - Labels are low-cardinality: never the group address or client IP

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "relay_requests_total";
pub const SESSIONS_ACTIVE: &str = "relay_sessions_active";
pub const CONNECTIONS_ACTIVE: &str = "relay_connections_active";
pub const TTFB_SECONDS: &str = "relay_ttfb_seconds";
pub const BYTES_TOTAL: &str = "relay_bytes_total";
pub const SESSION_DURATION_SECONDS: &str = "relay_session_duration_seconds";
pub const OUTCOMES_TOTAL: &str = "relay_outcomes_total";

/// Install the global Prometheus recorder with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16) {
    counter!(REQUESTS_TOTAL, "method" => method_label(method), "status" => status.to_string())
        .increment(1);
}

/// Clients may send any extension method; only the served ones get a label.
fn method_label(method: &str) -> &'static str {
    match method {
        "GET" => "GET",
        "HEAD" => "HEAD",
        _ => "other",
    }
}

pub fn session_opened() {
    gauge!(SESSIONS_ACTIVE).increment(1.0);
}

pub fn session_closed() {
    gauge!(SESSIONS_ACTIVE).decrement(1.0);
}

pub fn connection_opened() {
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

pub fn connection_closed() {
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

pub fn record_ttfb(elapsed: Duration) {
    histogram!(TTFB_SECONDS).record(elapsed.as_secs_f64());
}

/// Record the end of one relay loop.
pub fn record_relay_finished(outcome: &'static str, bytes: u64, duration: Duration) {
    counter!(OUTCOMES_TOTAL, "outcome" => outcome).increment(1);
    counter!(BYTES_TOTAL).increment(bytes);
    histogram!(SESSION_DURATION_SECONDS).record(duration.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_label_is_bounded() {
        assert_eq!(method_label("GET"), "GET");
        assert_eq!(method_label("HEAD"), "HEAD");
        assert_eq!(method_label("POST"), "other");
        assert_eq!(method_label("X-CUSTOM-VERB-12345"), "other");
        assert_eq!(method_label("get"), "other");
    }
}
