//! In-process backing store.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::gateway::{Gateway, GatewayError};

/// A `HashMap` standing in for a real backing store.
#[derive(Debug, Default)]
pub struct MemoryGateway<K, V> {
    data: RwLock<HashMap<K, V>>,
}

impl<K, V> MemoryGateway<K, V>
where
    K: Hash + Eq,
{
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the store.
    pub fn with_entries(entries: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            data: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Copy of the current contents.
    pub async fn snapshot(&self) -> HashMap<K, V>
    where
        K: Clone,
        V: Clone,
    {
        self.data.read().await.clone()
    }
}

#[async_trait]
impl<K, V> Gateway<K, V> for MemoryGateway<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn load(&self, key: &K) -> Result<V, GatewayError> {
        self.data
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("{key:?}")))
    }

    async fn persist(&self, key: &K, value: &V, timestamp: u64) -> Result<(), GatewayError> {
        self.data.write().await.insert(key.clone(), value.clone());
        debug!(key = ?key, timestamp, "Persisted to memory store");
        Ok(())
    }
}
