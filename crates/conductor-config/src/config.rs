use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Top-level config (`conductor.toml` + `CONDUCTOR_*` env overrides),
/// following the reference system's `SkynetConfig::load` shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            worker: WorkerConfig::default(),
        }
    }
}

impl ConductorConfig {
    /// Loads config from `config_path` (or the default
    /// `~/.conductor/conductor.toml` when `None`), layering
    /// `CONDUCTOR_`-prefixed env vars on top. Missing file is not an
    /// error — Figment simply contributes nothing and defaults apply.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(config_path = %path, "loading config");

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CONDUCTOR_").split("_"))
            .extract()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Worker knobs. Shared by the conversation and task workers — both
/// poll/concurrency-bound loops of the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_max_messages_to_include")]
    pub max_messages_to_include: usize,
    #[serde(default = "default_chat_timeout_ms")]
    pub chat_timeout_ms: u64,
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_min_interval_seconds")]
    pub min_interval_seconds: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent: default_max_concurrent(),
            max_messages_to_include: default_max_messages_to_include(),
            chat_timeout_ms: default_chat_timeout_ms(),
            execution_timeout_ms: default_execution_timeout_ms(),
            max_retries: default_max_retries(),
            min_interval_seconds: default_min_interval_seconds(),
        }
    }
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.conductor/conductor.db")
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_max_concurrent() -> usize {
    5
}

fn default_max_messages_to_include() -> usize {
    20
}

fn default_chat_timeout_ms() -> u64 {
    120_000
}

fn default_execution_timeout_ms() -> u64 {
    300_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_min_interval_seconds() -> i64 {
    15
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.conductor/conductor.toml")
}
