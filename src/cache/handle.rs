//! Public cache handle.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::cache::engine::CacheEngine;
use crate::cache::error::CacheError;
use crate::cache::events::Event;
use crate::cache::record::AccessDetails;
use crate::config::{EvictionAlgorithm, PersistAlgorithm};
use crate::dispatch::ShardDispatcher;
use crate::metrics::CacheMetrics;

/// Point-in-time view of cache occupancy and configuration.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub maximum_size: usize,
    pub shards: usize,
    pub eviction_algorithm: EvictionAlgorithm,
    pub persist_algorithm: PersistAlgorithm,
    /// Operations accepted per shard.
    pub dispatched: Vec<u64>,
    /// Deferred persists not yet finished.
    pub pending_writes: u64,
    pub events: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Sharded async cache.
///
/// Every `get`/`set` is routed to the shard worker owning the key, so
/// operations on one key run one at a time in call order while different keys
/// proceed concurrently. Cloning is cheap and clones share all state.
///
/// Build one with [`CacheBuilder`](crate::cache::CacheBuilder).
pub struct Cache<K, V> {
    engine: Arc<CacheEngine<K, V>>,
    dispatcher: Arc<ShardDispatcher>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            dispatcher: Arc::clone(&self.dispatcher),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(engine: CacheEngine<K, V>, dispatcher: ShardDispatcher) -> Self {
        Self {
            engine: Arc::new(engine),
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Value for `key`, loading from the backing store on a miss.
    ///
    /// Fails with [`CacheError::LoadFailure`] when the key is not cached and
    /// the backing store cannot produce it; the key is left absent.
    pub async fn get(&self, key: K) -> Result<V, CacheError> {
        let engine = Arc::clone(&self.engine);
        let route = key.clone();
        self.dispatcher.dispatch(&route, engine.get(key)).await?
    }

    /// Store `value` under `key`.
    ///
    /// Under write-through this waits for the backing store and fails with
    /// [`CacheError::PersistFailure`] if it rejects the write. The new value
    /// is visible in the cache either way.
    pub async fn set(&self, key: K, value: V) -> Result<(), CacheError> {
        let engine = Arc::clone(&self.engine);
        let route = key.clone();
        self.dispatcher.dispatch(&route, engine.set(key, value)).await?
    }

    /// Snapshot of every event so far, oldest first.
    pub fn event_log(&self) -> Vec<Event<K, V>> {
        self.engine.events().snapshot()
    }

    /// Receive events appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event<K, V>> {
        self.engine.events().subscribe()
    }

    /// Wait for every deferred write-back persist queued so far.
    pub async fn flush(&self) -> Result<(), CacheError> {
        self.engine.write_behind().flush().await?;
        Ok(())
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        self.engine.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Whether `key` has a record, live or stale. Does not count as an access.
    pub async fn contains(&self, key: &K) -> bool {
        self.engine.contains(key).await
    }

    /// Current access metadata for `key`. Does not count as an access.
    pub async fn access_details(&self, key: &K) -> Option<AccessDetails> {
        self.engine.access_details(key).await
    }

    pub fn metrics(&self) -> &CacheMetrics {
        self.engine.metrics()
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len().await,
            maximum_size: self.engine.evictor().maximum_size(),
            shards: self.dispatcher.shard_count(),
            eviction_algorithm: self.engine.eviction_algorithm().await,
            persist_algorithm: self.engine.persist_algorithm(),
            dispatched: self.dispatcher.stats().dispatched(),
            pending_writes: self.engine.write_behind().pending(),
            events: self.engine.events().len(),
            hits: self.engine.metrics().hits(),
            misses: self.engine.metrics().misses(),
        }
    }
}
