//! Resolved server configuration.
//!
//! `ServerConfig` is what the request path sees: every optional value has
//! been filled in and every string parsed. It is built once at startup and
//! shared read-only behind an `Arc`.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::relay::multicast::{SessionSettings, MAX_DATAGRAM_SIZE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// HTTP listen address; its family selects IPv4 or IPv6.
    pub listen: SocketAddr,
    /// Address multicast groups are joined from.
    pub source_ip: Ipv4Addr,
    /// Maximum wait for the next datagram.
    pub idle_timeout: Duration,
    /// Receive buffer per datagram read.
    pub read_buffer_size: usize,
    /// Concurrent connection limit.
    pub max_connections: usize,
    /// Log unexpected errors with full detail.
    pub debug: bool,
}

impl ServerConfig {
    pub fn new(listen: SocketAddr, source_ip: Ipv4Addr, idle_timeout: Duration) -> Self {
        Self {
            listen,
            source_ip,
            idle_timeout,
            read_buffer_size: MAX_DATAGRAM_SIZE,
            max_connections: 1024,
            debug: false,
        }
    }

    /// Socket parameters for each multicast session.
    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            source_ip: self.source_ip,
            idle_timeout: self.idle_timeout,
            read_buffer_size: self.read_buffer_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_settings_follow_config() {
        let mut config = ServerConfig::new(
            "127.0.0.1:8080".parse().unwrap(),
            Ipv4Addr::new(192, 0, 2, 7),
            Duration::from_millis(750),
        );
        config.read_buffer_size = 1500;

        let settings = config.session_settings();
        assert_eq!(settings.source_ip, Ipv4Addr::new(192, 0, 2, 7));
        assert_eq!(settings.idle_timeout, Duration::from_millis(750));
        assert_eq!(settings.read_buffer_size, 1500);
    }
}
