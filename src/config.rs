//! Exporter configuration.
//!
//! Configuration is loaded from a YAML file (`config.yml` by default) into a
//! single [`Config`] struct. Every key has a default so a minimal file only
//! needs the validator's identity and vote public keys.

use std::fmt;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;

/// Top-level exporter configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity public key of the monitored validator (base58).
    pub pub_key: String,
    /// Vote account public key of the monitored validator (base58).
    pub vote_pub_key: String,
    /// Public network RPC endpoint used as the comparison baseline.
    pub network_rpc_endpoint: String,
    /// The validator's own local RPC endpoint.
    pub validator_rpc_endpoint: String,
    /// Path to the `solana` CLI binary.
    pub solana_binary_path: String,
    /// Size of the worker pool running blocking CLI tasks.
    pub thread_pool_size: usize,
    /// Seconds to sleep between collection cycles.
    pub sleep_time: u64,
    /// Port the `/metrics` endpoint listens on.
    pub metric_port: u16,
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Upper bound on retries of a slow dual-endpoint request.
    pub retry: u32,
    /// Optional substring filter applied to previously-seen node versions
    /// when zeroing stale version gauges. The original deployment only
    /// tracked versions containing `"1.0"`; leave unset to track all.
    pub version_filter: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pub_key: String::new(),
            vote_pub_key: String::new(),
            network_rpc_endpoint: "https://api.testnet.solana.com".to_string(),
            validator_rpc_endpoint: "http://localhost:8899".to_string(),
            solana_binary_path: "solana".to_string(),
            thread_pool_size: 4,
            sleep_time: 45,
            metric_port: 1234,
            log_level: "info".to_string(),
            retry: 5,
            version_filter: None,
        }
    }
}

/// Error loading or parsing the configuration file.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(String),
    /// The file is not valid YAML or does not match the expected shape.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config read error: {msg}"),
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        serde_yaml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Address the metrics HTTP exporter binds to.
    pub fn metrics_listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.metric_port))
    }
}
