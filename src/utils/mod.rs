//! Configuration and startup utilities.

/// Layered TOML + environment configuration with fail-fast validation.
pub mod config;
/// Tracing subscriber setup.
pub mod telemetry;

pub use config::{ConfigError, DocqaConfig};
