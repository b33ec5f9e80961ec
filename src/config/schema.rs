//! Configuration schema definitions.
//!
//! This module defines the configuration file structure for the relay.
//! All types derive Serde traits for deserialization from TOML.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::relay::multicast::MAX_DATAGRAM_SIZE;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Multicast join and read settings.
    pub multicast: MulticastConfig,

    /// Logging and metrics settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Listen address without port ("0.0.0.0", "::", "127.0.0.1").
    pub bind_address: String,

    /// HTTP listen port.
    pub port: u16,

    /// Maximum concurrent client connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            max_connections: 1024,
        }
    }
}

/// Multicast configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MulticastConfig {
    /// IPv4 address groups are joined from. Discovered at startup if unset.
    pub source_ip: Option<Ipv4Addr>,

    /// Maximum wait for the next datagram, in milliseconds.
    pub idle_timeout_ms: u64,

    /// Receive buffer per datagram read, in bytes.
    pub read_buffer_size: usize,

    /// `host:port` dialed to discover the local source address.
    pub discovery_address: String,
}

impl Default for MulticastConfig {
    fn default() -> Self {
        Self {
            source_ip: None,
            idle_timeout_ms: 2000,
            read_buffer_size: MAX_DATAGRAM_SIZE,
            discovery_address: "ipv4.google.com:80".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log unexpected errors with full detail.
    pub debug: bool,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
