//! Layered configuration: a TOML file merged with `CONDUCTOR_*`
//! environment overrides, following the reference system's
//! `SkynetConfig::load` pattern.

mod config;
mod error;

pub use config::{ConductorConfig, DatabaseConfig, WorkerConfig};
pub use error::{ConfigError, Result};
