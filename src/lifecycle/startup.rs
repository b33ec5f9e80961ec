//! Startup orchestration.
//!
//! # Responsibilities
//! - Turn a validated `RelayConfig` into the immutable `ServerConfig`
//! - Discover the local source address when none is configured
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Discovery dials a TCP connection and reads back the local address the
//!   kernel picked; no data is exchanged

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpStream;

use crate::config::{validate_config, ConfigError, RelayConfig, ServerConfig};

/// Upper bound on the discovery connection attempt.
pub const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid listen address {0:?}")]
    ListenAddress(String),

    #[error("source address discovery via {target} failed: {source}")]
    Discovery {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("source address discovery via {target} yielded non-IPv4 address {addr}")]
    NotIpv4 { target: String, addr: IpAddr },
}

/// Find the local IPv4 address used to reach `target` (`host:port`).
pub async fn discover_source_ip(target: &str) -> Result<Ipv4Addr, StartupError> {
    let discovery_failed = |source: io::Error| StartupError::Discovery {
        target: target.to_string(),
        source,
    };

    let stream = tokio::time::timeout(DISCOVERY_TIMEOUT, TcpStream::connect(target))
        .await
        .map_err(|_| discovery_failed(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")))?
        .map_err(discovery_failed)?;
    let local = stream.local_addr().map_err(discovery_failed)?;

    match local.ip() {
        IpAddr::V4(ip) => Ok(ip),
        addr => Err(StartupError::NotIpv4 {
            target: target.to_string(),
            addr,
        }),
    }
}

/// Validate `config`, fill in the source address and build `ServerConfig`.
pub async fn resolve_server_config(config: &RelayConfig) -> Result<ServerConfig, StartupError> {
    validate_config(config).map_err(|errors| StartupError::Config(ConfigError::Validation(errors)))?;

    let bind_ip: IpAddr = config
        .listener
        .bind_address
        .parse()
        .map_err(|_| StartupError::ListenAddress(config.listener.bind_address.clone()))?;

    let source_ip = match config.multicast.source_ip {
        Some(ip) => ip,
        None => {
            tracing::debug!(
                target = %config.multicast.discovery_address,
                "Connecting to discovery address to find our source address"
            );
            discover_source_ip(&config.multicast.discovery_address).await?
        }
    };
    tracing::debug!(source_ip = %source_ip, "Will join groups from this address");

    Ok(ServerConfig {
        listen: SocketAddr::new(bind_ip, config.listener.port),
        source_ip,
        idle_timeout: Duration::from_millis(config.multicast.idle_timeout_ms),
        read_buffer_size: config.multicast.read_buffer_size,
        max_connections: config.listener.max_connections,
        debug: config.observability.debug,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn discovers_loopback_source() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap().to_string();

        let ip = discover_source_ip(&target).await.unwrap();
        assert_eq!(ip, Ipv4Addr::LOCALHOST);
    }

    #[tokio::test]
    async fn unreachable_discovery_target_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = discover_source_ip(&target).await.unwrap_err();
        assert!(matches!(err, StartupError::Discovery { .. }));
    }

    #[tokio::test]
    async fn explicit_source_skips_discovery() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "::".into();
        config.listener.port = 8123;
        config.multicast.source_ip = Some(Ipv4Addr::new(192, 0, 2, 44));
        config.multicast.idle_timeout_ms = 1500;
        config.multicast.discovery_address = "unused.invalid:80".into();
        config.observability.debug = true;

        let server = resolve_server_config(&config).await.unwrap();
        assert_eq!(server.listen, "[::]:8123".parse().unwrap());
        assert!(server.listen.is_ipv6());
        assert_eq!(server.source_ip, Ipv4Addr::new(192, 0, 2, 44));
        assert_eq!(server.idle_timeout, Duration::from_millis(1500));
        assert!(server.debug);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let mut config = RelayConfig::default();
        config.multicast.source_ip = Some(Ipv4Addr::LOCALHOST);
        config.multicast.idle_timeout_ms = 0;

        let err = resolve_server_config(&config).await.unwrap_err();
        assert!(matches!(err, StartupError::Config(ConfigError::Validation(_))));
    }
}
