//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber
//! - Pick the log level from config, `--verbose` and `RUST_LOG`
//! - Report unexpected errors according to the debug flag
//!
//! # Design Decisions
//! - `RUST_LOG` wins over everything else when set
//! - Unexpected errors are logged with full `Debug` detail only in debug
//!   mode; otherwise a single info line keeps noisy clients out of the logs

use std::error::Error;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level };
    format!("mcast_relay={level},tower_http={level}")
}

/// Install the global subscriber.
pub fn init(level: &str, verbose: bool) {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(level, verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Log an unexpected, connection-local error.
pub fn report_error<E: Error>(debug: bool, context: &str, err: &E) {
    if debug {
        tracing::error!(error = ?err, "{}", context);
    } else {
        tracing::info!(error = %err, "{}", context);
    }
}
