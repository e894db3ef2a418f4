use std::path::{Path, PathBuf};

use bitcoin::Network;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path}: {err}")]
    Io { path: PathBuf, err: String },

    #[error("parse: {0}")]
    Parse(String),

    #[error("authority keyset: {0}")]
    Authority(#[from] crate::authority::AuthorityError),
}

/// Node configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: Network,
    pub chain_id: u64,
    pub datadir: PathBuf,
    pub bitcoind: BitcoindConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    /// Path to the trusted-authority keyset; optional on dev networks.
    #[serde(default)]
    pub authorities: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BitcoindConfig {
    pub rpc_url: String,
    pub rpc_user: String,
    pub rpc_password: String,
    /// Request deadline for bulk RPC calls, seconds.
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
    /// Deadline for interactive calls, seconds.
    #[serde(default = "default_interactive_timeout")]
    pub interactive_timeout_secs: u64,
}

fn default_rpc_timeout() -> u64 {
    240
}

fn default_interactive_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Drop the database and index from scratch.
    pub reindex: bool,
    /// Override the first indexed height when reindexing.
    pub reindex_from_block: Option<u64>,
    pub maximum_prefetch_blocks: usize,
    /// Serve reads only; never advance the chain.
    pub readonly_mode: bool,
    /// Sweep spent UTXOs older than this many blocks.
    pub purge_spent_utxo_older_than_blocks: Option<u64>,
    pub poll_interval_ms: u64,
    pub max_reorg_depth: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reindex: false,
            reindex_from_block: None,
            maximum_prefetch_blocks: 10,
            readonly_mode: false,
            purge_spent_utxo_older_than_blocks: None,
            poll_interval_ms: 1_000,
            max_reorg_depth: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    pub listen: String,
    pub maximum_requests_per_batch: usize,
    pub maximum_pending_requests_per_threads: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9001".to_string(),
            maximum_requests_per_batch: 50,
            maximum_pending_requests_per_threads: 100,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            err: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// First height the indexer should process.
    pub fn start_height(&self, enabled_at: u64) -> u64 {
        match (self.sync.reindex, self.sync.reindex_from_block) {
            (true, Some(height)) => height,
            _ => enabled_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        network = "regtest"
        chain_id = 1
        datadir = "/tmp/opnet"

        [bitcoind]
        rpc_url = "http://127.0.0.1:18443"
        rpc_user = "user"
        rpc_password = "pass"

        [sync]
        maximum_prefetch_blocks = 16
        purge_spent_utxo_older_than_blocks = 1000
    "#;

    #[test]
    fn test_parse_sample() {
        let config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.network, Network::Regtest);
        assert_eq!(config.sync.maximum_prefetch_blocks, 16);
        assert_eq!(config.sync.purge_spent_utxo_older_than_blocks, Some(1000));
        // defaults fill the rest
        assert_eq!(config.bitcoind.timeout_secs, 240);
        assert_eq!(config.rpc.maximum_requests_per_batch, 50);
        assert!(!config.sync.reindex);
    }

    #[test]
    fn test_start_height_honours_reindex() {
        let mut config: Config = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.start_height(500), 500);

        config.sync.reindex = true;
        config.sync.reindex_from_block = Some(100);
        assert_eq!(config.start_height(500), 100);
    }
}
