//! Client configuration with TOML and environment support.

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::builder::BuilderConfig;

/// Environment variable names.
pub mod env {
    pub const CONFIG: &str = "EMP_CONFIG";
    pub const RPC_URL: &str = "EMP_RPC_URL";
    pub const ADDRESS: &str = "EMP_ADDRESS";
    pub const POLL_INTERVAL_SECS: &str = "EMP_POLL_INTERVAL_SECS";
    pub const FROM_BLOCK: &str = "EMP_FROM_BLOCK";
    pub const MAX_CONCURRENT_FETCHES: &str = "EMP_MAX_CONCURRENT_FETCHES";
    pub const LOG_CHUNK_SIZE: &str = "EMP_LOG_CHUNK_SIZE";
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {name}: {value:?} ({message})")]
    InvalidVar {
        name: &'static str,
        value: String,
        message: String,
    },

    #[error("no EMP contract address configured (set {})", env::ADDRESS)]
    MissingAddress,
}

/// Monitoring client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON-RPC HTTP endpoint
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// EMP contract to monitor
    #[serde(default)]
    pub contract_address: Option<Address>,

    /// Delay between refresh cycles (seconds)
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// First block scanned for `NewSponsor` logs
    #[serde(default)]
    pub from_block: u64,

    /// Cap on concurrent per-sponsor fetches; unset means unbounded
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,

    /// Block span per `eth_getLogs` request; unset means one request
    #[serde(default)]
    pub log_chunk_size: Option<u64>,
}

fn default_rpc_url() -> String {
    "http://localhost:8545".to_string()
}
fn default_poll_interval() -> u64 {
    10
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            contract_address: None,
            poll_interval_secs: default_poll_interval(),
            from_block: 0,
            max_concurrent_fetches: None,
            log_chunk_size: None,
        }
    }
}

fn parse_var<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::InvalidVar {
        name,
        message: e.to_string(),
        value,
    })
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from `EMP_CONFIG` if set, otherwise from individual `EMP_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`] with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(path) = lookup(env::CONFIG) {
            return Self::from_file(path);
        }

        let mut config = Self::default();
        if let Some(url) = lookup(env::RPC_URL) {
            config.rpc_url = url;
        }
        if let Some(v) = lookup(env::ADDRESS) {
            config.contract_address = Some(parse_var(env::ADDRESS, v)?);
        }
        if let Some(v) = lookup(env::POLL_INTERVAL_SECS) {
            config.poll_interval_secs = parse_var(env::POLL_INTERVAL_SECS, v)?;
        }
        if let Some(v) = lookup(env::FROM_BLOCK) {
            config.from_block = parse_var(env::FROM_BLOCK, v)?;
        }
        if let Some(v) = lookup(env::MAX_CONCURRENT_FETCHES) {
            config.max_concurrent_fetches = Some(parse_var(env::MAX_CONCURRENT_FETCHES, v)?);
        }
        if let Some(v) = lookup(env::LOG_CHUNK_SIZE) {
            config.log_chunk_size = Some(parse_var(env::LOG_CHUNK_SIZE, v)?);
        }
        Ok(config)
    }

    /// Configured contract address, required to run.
    pub fn contract_address(&self) -> Result<Address, ConfigError> {
        self.contract_address.ok_or(ConfigError::MissingAddress)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            from_block: self.from_block,
            max_concurrent_fetches: self.max_concurrent_fetches,
        }
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(
            rpc_url = %self.rpc_url,
            emp = ?self.contract_address,
            poll_interval_secs = self.poll_interval_secs,
            "Client configuration loaded"
        );
        tracing::info!(
            from_block = self.from_block,
            max_concurrent_fetches = ?self.max_concurrent_fetches,
            log_chunk_size = ?self.log_chunk_size,
            "Refresh strategy"
        );
    }
}
