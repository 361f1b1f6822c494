//! Runtime configuration for kv-shard-cache.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! All cache knobs (capacity, expiry, policies, shard count) live here.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "kv-shard-cache", about = "Sharded async key-value cache server")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Cache engine configuration.
    pub cache: CacheConfig,

    /// Backing store configuration.
    pub store: StoreConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8080").
    pub listen: String,

    /// Capacity of the live event broadcast used by the SSE endpoint.
    pub event_stream_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            event_stream_capacity: 1024,
        }
    }
}

/// Ordering used by the priority index to pick eviction victims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionAlgorithm {
    /// Least recently used first.
    #[default]
    Recency,
    /// Least frequently used first, ties broken by recency.
    Frequency,
}

impl std::fmt::Display for EvictionAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionAlgorithm::Recency => write!(f, "LRU"),
            EvictionAlgorithm::Frequency => write!(f, "LFU"),
        }
    }
}

/// When a `set` reaches the backing store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistAlgorithm {
    /// Persist before `set` resolves.
    #[default]
    WriteThrough,
    /// Resolve `set` immediately; persist from the shard's write-behind queue.
    WriteBack,
}

impl std::fmt::Display for PersistAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistAlgorithm::WriteThrough => write!(f, "write-through"),
            PersistAlgorithm::WriteBack => write!(f, "write-back"),
        }
    }
}

/// Cache engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live records.
    pub maximum_size: usize,

    /// Age in seconds after which a record is stale.
    pub expiry_secs: u64,

    /// Priority index ordering.
    pub eviction_algorithm: EvictionAlgorithm,

    /// Persistence mode for `set`.
    pub persist_algorithm: PersistAlgorithm,

    /// Number of shard workers.
    pub pool_size: usize,

    /// Keys loaded from the backing store before the cache is handed out.
    pub load_keys_on_start: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            maximum_size: 1000,
            expiry_secs: 365 * 24 * 60 * 60,
            eviction_algorithm: EvictionAlgorithm::Recency,
            persist_algorithm: PersistAlgorithm::WriteThrough,
            pool_size: 1,
            load_keys_on_start: Vec::new(),
        }
    }
}

impl CacheConfig {
    pub fn expiry_time(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}

/// Backing store settings for the bundled file gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one JSON document per key.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/tmp/kv-shard-cache"),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
