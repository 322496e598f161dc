//! History index configuration
//!
//! Loaded from JSON. Every field has a default, so an empty object is a
//! valid configuration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default capacity of the (block, tx) -> file location cache.
pub const DEFAULT_BLOCK_LOCATION_CACHE_CAPACITY: usize = 100_000;

/// Default capacity of the file location -> transaction bytes cache.
pub const DEFAULT_TX_CACHE_CAPACITY: usize = 10_000;

/// Lowest block number accepted by block-range queries. Block 0 is the
/// genesis block.
pub const DEFAULT_MIN_BLOCK_NUM: u64 = 1;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Sizing for one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
}

impl CacheConfig {
    pub fn enabled(capacity: usize) -> Self {
        Self {
            enabled: true,
            capacity,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            capacity: 0,
        }
    }
}

/// Configuration for the history index and its block store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Lowest block number a block-range query may start at.
    pub min_block_num: u64,
    /// Cache of (block, tx) -> location in the block file.
    pub block_location_cache: CacheConfig,
    /// Cache of location -> raw transaction bytes.
    pub tx_cache: CacheConfig,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            min_block_num: DEFAULT_MIN_BLOCK_NUM,
            block_location_cache: CacheConfig::enabled(DEFAULT_BLOCK_LOCATION_CACHE_CAPACITY),
            tx_cache: CacheConfig::enabled(DEFAULT_TX_CACHE_CAPACITY),
        }
    }
}

impl HistoryConfig {
    /// Both caches turned off. Every lookup goes to storage.
    pub fn without_caches() -> Self {
        Self {
            block_location_cache: CacheConfig::disabled(),
            tx_cache: CacheConfig::disabled(),
            ..Self::default()
        }
    }

    /// Rejects an enabled cache with zero capacity.
    pub fn validate(&self) -> ConfigResult<()> {
        for (name, cache) in [
            ("block_location_cache", &self.block_location_cache),
            ("tx_cache", &self.tx_cache),
        ] {
            if cache.enabled && cache.capacity == 0 {
                return Err(ConfigError::Invalid(format!(
                    "{} is enabled with capacity 0",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Parses and validates a JSON document.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
