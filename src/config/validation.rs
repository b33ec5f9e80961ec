//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid, buffer sizes)
//! - Check addresses parse before anything binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::{IpAddr, SocketAddr};

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::relay::multicast::MAX_DATAGRAM_SIZE;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not an IP address")]
    BindAddress(String),

    #[error("listener.port must be non-zero")]
    ZeroPort,

    #[error("listener.max_connections must be at least 1")]
    NoConnections,

    #[error("multicast.idle_timeout_ms must be at least 1")]
    ZeroTimeout,

    #[error("multicast.read_buffer_size must be between 1 and {max}, got {0}", max = MAX_DATAGRAM_SIZE)]
    ReadBufferSize(usize),

    #[error("multicast.source_ip {0} must be a unicast interface address")]
    SourceIp(std::net::Ipv4Addr),

    #[error("multicast.discovery_address must not be empty when source_ip is unset")]
    MissingDiscoveryAddress,

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Check every semantic rule, collecting all failures.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<IpAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }

    let multicast = &config.multicast;
    if multicast.idle_timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout);
    }
    if !(1..=MAX_DATAGRAM_SIZE).contains(&multicast.read_buffer_size) {
        errors.push(ValidationError::ReadBufferSize(multicast.read_buffer_size));
    }
    match multicast.source_ip {
        Some(ip) if ip.is_multicast() || ip.is_broadcast() || ip.is_unspecified() => {
            errors.push(ValidationError::SourceIp(ip));
        }
        Some(_) => {}
        None if multicast.discovery_address.trim().is_empty() => {
            errors.push(ValidationError::MissingDiscoveryAddress);
        }
        None => {}
    }

    let observability = &config.observability;
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(observability.metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
