//! Backing store gateways.
//!
//! The cache never owns durable data; it loads misses from and persists writes
//! to a [`Gateway`]. Failures are returned to the cache, which surfaces them to
//! the caller without retrying.
//!
//! - [`memory`]: in-process `HashMap` store
//! - [`file`]: one JSON document per key on local disk

pub mod file;
pub mod memory;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use file::FileGateway;
pub use memory::MemoryGateway;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("key not found in backing store: {0}")]
    NotFound(String),

    #[error("backing store rejected the operation: {0}")]
    Rejected(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document at {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Slow store sitting behind the cache.
#[async_trait]
pub trait Gateway<K, V>: Send + Sync + 'static {
    /// Fetch the value for `key`.
    async fn load(&self, key: &K) -> Result<V, GatewayError>;

    /// Store `value` for `key`. `timestamp` is the record's insertion time.
    async fn persist(&self, key: &K, value: &V, timestamp: u64) -> Result<(), GatewayError>;
}

#[async_trait]
impl<K, V, G> Gateway<K, V> for Arc<G>
where
    K: Sync + 'static,
    V: Sync + 'static,
    G: Gateway<K, V>,
{
    async fn load(&self, key: &K) -> Result<V, GatewayError> {
        (**self).load(key).await
    }

    async fn persist(&self, key: &K, value: &V, timestamp: u64) -> Result<(), GatewayError> {
        (**self).persist(key, value, timestamp).await
    }
}
