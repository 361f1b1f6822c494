//! Builder for configuring and constructing a [`Cache`].

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{info, warn};

use crate::cache::engine::CacheEngine;
use crate::cache::error::CacheError;
use crate::cache::events::EventLog;
use crate::cache::evictor::Evictor;
use crate::cache::handle::Cache;
use crate::cache::store::RecordStore;
use crate::clock::{Clock, MonotonicClock};
use crate::config::{CacheConfig, EvictionAlgorithm, PersistAlgorithm};
use crate::dispatch::{ShardDispatcher, WriteBehind};
use crate::gateway::Gateway;
use crate::metrics::CacheMetrics;

/// Builder for a [`Cache`].
///
/// Only the gateway is required; everything else has a default (see
/// [`CacheConfig::default`]).
///
/// ```no_run
/// # async fn demo() -> Result<(), kv_shard_cache::CacheError> {
/// use std::time::Duration;
/// use kv_shard_cache::{CacheBuilder, EvictionAlgorithm, MemoryGateway};
///
/// let gateway = MemoryGateway::with_entries([("SDE".to_string(), "Ram".to_string())]);
/// let cache = CacheBuilder::<String, String>::new()
///     .maximum_size(100)
///     .expiry_time(Duration::from_secs(60))
///     .eviction_algorithm(EvictionAlgorithm::Frequency)
///     .gateway(gateway)
///     .build()
///     .await?;
///
/// assert_eq!(cache.get("SDE".to_string()).await?, "Ram");
/// # Ok(())
/// # }
/// ```
pub struct CacheBuilder<K, V> {
    maximum_size: usize,
    expiry_time: Duration,
    eviction_algorithm: EvictionAlgorithm,
    persist_algorithm: PersistAlgorithm,
    pool_size: usize,
    load_keys_on_start: Vec<K>,
    gateway: Option<Arc<dyn Gateway<K, V>>>,
    clock: Arc<dyn Clock>,
    event_stream_capacity: usize,
}

impl<K, V> CacheBuilder<K, V> {
    pub fn new() -> Self {
        let defaults = CacheConfig::default();
        Self {
            maximum_size: defaults.maximum_size,
            expiry_time: defaults.expiry_time(),
            eviction_algorithm: defaults.eviction_algorithm,
            persist_algorithm: defaults.persist_algorithm,
            pool_size: defaults.pool_size,
            load_keys_on_start: Vec::new(),
            gateway: None,
            clock: Arc::new(MonotonicClock::new()),
            event_stream_capacity: 1024,
        }
    }

    pub fn maximum_size(mut self, maximum_size: usize) -> Self {
        self.maximum_size = maximum_size;
        self
    }

    /// Age after which a record is stale.
    pub fn expiry_time(mut self, expiry_time: Duration) -> Self {
        self.expiry_time = expiry_time;
        self
    }

    pub fn eviction_algorithm(mut self, algorithm: EvictionAlgorithm) -> Self {
        self.eviction_algorithm = algorithm;
        self
    }

    pub fn persist_algorithm(mut self, algorithm: PersistAlgorithm) -> Self {
        self.persist_algorithm = algorithm;
        self
    }

    /// Number of shard workers.
    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Keys to load before [`build`](Self::build) returns.
    pub fn load_keys_on_start(mut self, keys: impl IntoIterator<Item = K>) -> Self {
        self.load_keys_on_start.extend(keys);
        self
    }

    /// Backing store. Required.
    pub fn gateway<G: Gateway<K, V>>(mut self, gateway: G) -> Self {
        self.gateway = Some(Arc::new(gateway));
        self
    }

    pub fn clock<C: Clock>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// How many events a live subscriber may lag before missing some.
    pub fn event_stream_capacity(mut self, capacity: usize) -> Self {
        self.event_stream_capacity = capacity;
        self
    }

    /// Apply every setting from a config section.
    pub fn from_config(config: &CacheConfig) -> Self
    where
        K: From<String>,
    {
        Self::new()
            .maximum_size(config.maximum_size)
            .expiry_time(config.expiry_time())
            .eviction_algorithm(config.eviction_algorithm)
            .persist_algorithm(config.persist_algorithm)
            .pool_size(config.pool_size)
            .load_keys_on_start(config.load_keys_on_start.iter().cloned().map(K::from))
    }
}

impl<K, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Validate the settings, start the shard workers and warm the
    /// configured keys.
    ///
    /// Must run inside a tokio runtime. Warm-up failures are logged and the
    /// key is left absent; they do not fail construction.
    pub async fn build(self) -> Result<Cache<K, V>, CacheError> {
        let gateway = self
            .gateway
            .ok_or_else(|| CacheError::Configuration("no backing gateway configured".into()))?;
        if self.maximum_size == 0 {
            return Err(CacheError::Configuration(
                "maximum_size must be at least 1".into(),
            ));
        }
        if self.pool_size == 0 {
            return Err(CacheError::Configuration(
                "pool_size must be at least 1".into(),
            ));
        }

        let metrics = CacheMetrics::new()
            .map_err(|e| CacheError::Configuration(format!("metrics registry: {e}")))?;

        let engine = CacheEngine::new(
            RecordStore::new(self.eviction_algorithm),
            Evictor::new(self.maximum_size, self.expiry_time),
            self.persist_algorithm,
            gateway,
            self.clock,
            EventLog::new(self.event_stream_capacity),
            metrics,
            WriteBehind::new(self.pool_size),
        );
        let cache = Cache::new(engine, ShardDispatcher::new("cache", self.pool_size));

        info!(
            maximum_size = self.maximum_size,
            expiry_secs = self.expiry_time.as_secs(),
            eviction = %self.eviction_algorithm,
            persist = %self.persist_algorithm,
            pool_size = self.pool_size,
            warm_keys = self.load_keys_on_start.len(),
            "Cache built"
        );

        let warm = self.load_keys_on_start.into_iter().map(|key| {
            let cache = cache.clone();
            async move {
                if let Err(e) = cache.get(key.clone()).await {
                    warn!(key = ?key, error = %e, "Warm-up load failed");
                }
            }
        });
        join_all(warm).await;

        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;

    #[tokio::test]
    async fn test_build_without_gateway_fails() {
        let result = CacheBuilder::<String, String>::new().build().await;
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_build_rejects_zero_sizes() {
        let result = CacheBuilder::<String, String>::new()
            .maximum_size(0)
            .gateway(MemoryGateway::<String, String>::new())
            .build()
            .await;
        assert!(matches!(result, Err(CacheError::Configuration(_))));

        let result = CacheBuilder::<String, String>::new()
            .pool_size(0)
            .gateway(MemoryGateway::<String, String>::new())
            .build()
            .await;
        assert!(matches!(result, Err(CacheError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_from_config_applies_settings() {
        let config = CacheConfig {
            maximum_size: 7,
            pool_size: 3,
            eviction_algorithm: EvictionAlgorithm::Frequency,
            persist_algorithm: PersistAlgorithm::WriteBack,
            load_keys_on_start: vec!["a".into()],
            ..CacheConfig::default()
        };
        let gateway = MemoryGateway::with_entries([("a".to_string(), 1u32)]);
        let cache = CacheBuilder::<String, u32>::from_config(&config)
            .gateway(gateway)
            .build()
            .await
            .unwrap();

        let stats = cache.stats().await;
        assert_eq!(stats.maximum_size, 7);
        assert_eq!(stats.shards, 3);
        assert_eq!(stats.eviction_algorithm, EvictionAlgorithm::Frequency);
        assert_eq!(stats.persist_algorithm, PersistAlgorithm::WriteBack);
        assert_eq!(stats.size, 1);
    }
}
