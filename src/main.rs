//! mcast-relay
//!
//! Serves IPv4 multicast groups over plain HTTP.
//!
//! ```text
//!     HTTP client                     mcast-relay                    multicast group
//!     ───────────                     ───────────                    ───────────────
//!     GET /239.1.1.1/5000  ───▶  net::Listener ─▶ http::server
//!                                       │
//!                                       ▼
//!                              relay::path (validate)
//!                                       │
//!                                       ▼
//!                              relay::multicast (join)  ◀──────────  UDP datagrams
//!                                       │
//!                                       ▼
//!     200 octet-stream     ◀───  relay::stream (state machine)
//! ```

use std::error::Error;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use mcast_relay::config::{load_config, RelayConfig};
use mcast_relay::lifecycle::{resolve_server_config, signals, Shutdown};
use mcast_relay::net::Listener;
use mcast_relay::observability::{logging, metrics};
use mcast_relay::RelayServer;

#[derive(Debug, Parser)]
#[command(name = "mcast-relay", version)]
#[command(about = "Relay IPv4 multicast streams to HTTP clients", long_about = None)]
struct Cli {
    /// Address to listen on ("0.0.0.0", "::", ...).
    listen: Option<String>,

    /// Port to listen on.
    port: Option<u16>,

    /// Source address for multicast joins (discovered when omitted).
    #[arg(long)]
    mcastip: Option<Ipv4Addr>,

    /// Idle timeout in milliseconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Log unexpected errors with full detail.
    #[arg(long)]
    debug: bool,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve Prometheus metrics on this address.
    #[arg(long)]
    metrics: Option<String>,
}

impl Cli {
    /// Command line values take precedence over the file.
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(listen) = &self.listen {
            config.listener.bind_address = listen.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(ip) = self.mcastip {
            config.multicast.source_ip = Some(ip);
        }
        if let Some(timeout) = self.timeout {
            config.multicast.idle_timeout_ms = timeout;
        }
        if self.debug {
            config.observability.debug = true;
        }
        if let Some(addr) = &self.metrics {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&config.observability.log_level, cli.verbose);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "mcast-relay starting");

    let server_config = resolve_server_config(&config).await?;

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr);
    }

    let listener = Listener::bind(server_config.listen, server_config.max_connections)?;
    tracing::info!(
        address = %listener.local_addr()?,
        source_ip = %server_config.source_ip,
        "Listening for connections"
    );

    let shutdown = Shutdown::new();
    let server = RelayServer::new(server_config, shutdown.clone());

    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
