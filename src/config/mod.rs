//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig + command line overrides
//!     → lifecycle::startup (source IP discovery)
//!     → ServerConfig (resolved, immutable)
//!     → shared via Arc to every connection
//! ```
//!
//! # Design Decisions
//! - Config is immutable once resolved; there is no reload
//! - All file fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod runtime;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use runtime::ServerConfig;
pub use schema::{ListenerConfig, MulticastConfig, ObservabilityConfig, RelayConfig};
pub use validation::{validate_config, ValidationError};
