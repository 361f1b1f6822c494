//! File-backed backing store.
//!
//! Each key is stored as its own JSON document under the root directory.
//! File names are the hex encoding of the key bytes, spread over 256
//! subdirectories keyed by the first byte so no single directory grows huge.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::gateway::{Gateway, GatewayError};

/// Longest key the gateway stores. Its hex name plus `.json.tmp` stays
/// under the common 255-byte file name limit.
pub const MAX_KEY_BYTES: usize = 120;

/// On-disk document for one key.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry<V> {
    key: String,
    value: V,
    timestamp: u64,
}

#[derive(Debug, Default)]
pub struct FileGatewayStats {
    pub total_writes: AtomicU64,
    pub total_reads: AtomicU64,
    pub total_bytes_written: AtomicU64,
    pub total_bytes_read: AtomicU64,
}

/// Gateway storing `String` keys and any serde value on local disk.
#[derive(Debug)]
pub struct FileGateway {
    root: PathBuf,
    stats: FileGatewayStats,
}

impl FileGateway {
    /// Create the gateway, making sure the root directory exists.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, GatewayError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        Ok(Self {
            root,
            stats: FileGatewayStats::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document path for a key: `<root>/<first byte hex>/<key hex>.json`.
    ///
    /// Keys longer than [`MAX_KEY_BYTES`] would overflow the file name limit
    /// once hex encoded and are rejected.
    fn entry_path(&self, key: &str) -> Result<PathBuf, GatewayError> {
        if key.len() > MAX_KEY_BYTES {
            return Err(GatewayError::Rejected(format!(
                "key of {} bytes exceeds the {MAX_KEY_BYTES} byte limit",
                key.len()
            )));
        }
        let encoded: String = key.bytes().map(|b| format!("{b:02x}")).collect();
        let shard = encoded.get(..2).unwrap_or("00");
        Ok(self.root.join(shard).join(format!("{encoded}.json")))
    }

    pub fn stats(&self) -> &FileGatewayStats {
        &self.stats
    }
}

#[async_trait]
impl<V> Gateway<String, V> for FileGateway
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self, key: &String) -> Result<V, GatewayError> {
        let path = self.entry_path(key)?;

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GatewayError::NotFound(key.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        let entry: StoredEntry<V> = serde_json::from_slice(&data).map_err(|source| {
            GatewayError::Codec {
                path: path.clone(),
                source,
            }
        })?;

        debug!(key = %key, path = %path.display(), size = data.len(), "Read entry from disk");

        self.stats.total_reads.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_bytes_read
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        Ok(entry.value)
    }

    async fn persist(&self, key: &String, value: &V, timestamp: u64) -> Result<(), GatewayError> {
        let path = self.entry_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let entry = StoredEntry {
            key: key.clone(),
            value,
            timestamp,
        };
        let data = serde_json::to_vec(&entry).map_err(|source| GatewayError::Codec {
            path: path.clone(),
            source,
        })?;

        // Readers never observe a half-written document.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &data).await?;
        fs::rename(&tmp, &path).await?;

        debug!(key = %key, path = %path.display(), size = data.len(), "Wrote entry to disk");

        self.stats.total_writes.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);

        Ok(())
    }
}
