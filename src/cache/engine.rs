//! Cache engine: the operations a shard worker runs for a key.
//!
//! The engine owns the record store, the capacity section, the event log and
//! the gateway. It assumes its caller (the shard dispatcher) never runs two
//! operations for the same key at once; it does not assume anything about
//! other keys, which may be mutated concurrently from other shards.

use std::fmt::Debug;
use std::future::{self, Future};
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::cache::error::CacheError;
use crate::cache::events::{EventKind, EventLog, EvictionReason};
use crate::cache::evictor::Evictor;
use crate::cache::record::{AccessDetails, Record};
use crate::cache::store::RecordStore;
use crate::clock::Clock;
use crate::config::PersistAlgorithm;
use crate::dispatch::WriteBehind;
use crate::gateway::{Gateway, GatewayError};
use crate::metrics::CacheMetrics;

/// How a record being inserted came to be.
#[derive(Debug)]
pub(crate) enum Origin<K, V> {
    /// Fetched from the gateway on a miss.
    Load,
    /// Written by `set`; `previous` is the live record it replaces.
    Set { previous: Option<Record<K, V>> },
}

pub(crate) struct CacheEngine<K, V> {
    /// Map plus both indices, always updated together.
    store: RwLock<RecordStore<K, V>>,
    /// Held across make-room-and-insert so concurrent insertions cannot
    /// overshoot the capacity bound. Reads never take it.
    capacity: Mutex<()>,
    evictor: Evictor,
    persist: PersistAlgorithm,
    gateway: Arc<dyn Gateway<K, V>>,
    clock: Arc<dyn Clock>,
    events: EventLog<K, V>,
    metrics: CacheMetrics,
    write_behind: WriteBehind,
}

impl<K, V> CacheEngine<K, V>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        store: RecordStore<K, V>,
        evictor: Evictor,
        persist: PersistAlgorithm,
        gateway: Arc<dyn Gateway<K, V>>,
        clock: Arc<dyn Clock>,
        events: EventLog<K, V>,
        metrics: CacheMetrics,
        write_behind: WriteBehind,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            capacity: Mutex::new(()),
            evictor,
            persist,
            gateway,
            clock,
            events,
            metrics,
            write_behind,
        }
    }

    /// Return the value for `key`, loading it from the gateway on a miss or
    /// when the cached record has expired.
    pub(crate) async fn get(self: Arc<Self>, key: K) -> Result<V, CacheError> {
        // Misses never need the write lock on their way to the gateway.
        let cached = self.store.read().await.contains(&key);

        if cached {
            // Held only for the synchronous touch; never across an await.
            let mut store = self.store.write().await;
            let now = self.clock.now();
            let expired = store
                .get(&key)
                .map(|record| record.has_expired(now, self.evictor.expiry_nanos()));

            match expired {
                Some(false) => {
                    if let Some(record) = store.touch(&key, now) {
                        self.metrics.record_hit();
                        debug!(key = ?key, access_count = record.access.access_count, "Cache hit");
                        return Ok(record.value.clone());
                    }
                }
                Some(true) => {
                    if let Some(stale) = store.remove(&key) {
                        debug!(key = ?key, inserted = stale.insertion_time, "Record expired on access");
                        self.record_eviction(stale, EvictionReason::Expiry, now);
                    }
                }
                None => {}
            }
        }

        self.metrics.record_miss();
        let gateway = Arc::clone(&self.gateway);
        let load_key = key.clone();
        let record = self
            .add_record(
                key,
                async move { gateway.load(&load_key).await },
                Origin::Load,
            )
            .await?;

        // A concurrent insertion on another shard may already have evicted
        // the fresh record; the loaded value is still the answer.
        let mut store = self.store.write().await;
        let now = self.clock.now();
        Ok(store
            .touch(&record.key, now)
            .map_or(record.value, |touched| touched.value.clone()))
    }

    /// Replace the value for `key` and persist it per the configured mode.
    pub(crate) async fn set(self: Arc<Self>, key: K, value: V) -> Result<(), CacheError> {
        let previous = {
            let mut store = self.store.write().await;
            let now = self.clock.now();
            match store.remove(&key) {
                Some(old) if old.has_expired(now, self.evictor.expiry_nanos()) => {
                    self.record_eviction(old, EvictionReason::Expiry, now);
                    None
                }
                live => live,
            }
        };

        let record = self
            .add_record(key, future::ready(Ok(value)), Origin::Set { previous })
            .await?;

        match self.persist {
            PersistAlgorithm::WriteThrough => self.persist_record(&record).await,
            PersistAlgorithm::WriteBack => {
                let engine = Arc::clone(&self);
                let key = record.key.clone();
                self.write_behind.enqueue(&key, async move {
                    // Failure is already logged and counted.
                    let _ = engine.persist_record(&record).await;
                });
                Ok(())
            }
        }
    }

    /// Shared insertion path for misses and writes.
    ///
    /// The value is resolved before the capacity section is entered, so no
    /// worker ever holds the section while waiting on the gateway. Inside the
    /// section the evictor makes room, then the record is stamped and
    /// published into the store and both indices.
    pub(crate) async fn add_record<F>(
        &self,
        key: K,
        value: F,
        origin: Origin<K, V>,
    ) -> Result<Record<K, V>, CacheError>
    where
        F: Future<Output = Result<V, GatewayError>>,
    {
        let value = match value.await {
            Ok(value) => value,
            Err(e) => {
                self.metrics.record_load(false);
                warn!(key = ?key, error = %e, "Backing store load failed");
                return Err(CacheError::LoadFailure(e));
            }
        };

        let _capacity = self.capacity.lock().await;
        let mut store = self.store.write().await;
        let now = self.clock.now();

        for victim in self.evictor.make_room(&mut store, now) {
            self.record_eviction(victim.record, victim.reason, now);
        }

        let record = Record::new(key, value, now);
        store.insert(record.clone());

        match origin {
            Origin::Load => {
                self.metrics.record_load(true);
                self.events.append(record.clone(), now, EventKind::Load);
                debug!(key = ?record.key, size = store.len(), "Loaded record");
            }
            Origin::Set {
                previous: Some(previous),
            } => {
                self.events
                    .append(record.clone(), now, EventKind::Update { previous });
                debug!(key = ?record.key, "Replaced live record");
            }
            Origin::Set { previous: None } => {
                debug!(key = ?record.key, size = store.len(), "Inserted record");
            }
        }

        Ok(record)
    }

    async fn persist_record(&self, record: &Record<K, V>) -> Result<(), CacheError> {
        match self
            .gateway
            .persist(&record.key, &record.value, record.insertion_time)
            .await
        {
            Ok(()) => {
                self.metrics.record_persist(true);
                self.events
                    .append(record.clone(), self.clock.now(), EventKind::Write);
                Ok(())
            }
            Err(e) => {
                self.metrics.record_persist(false);
                warn!(
                    key = ?record.key,
                    mode = %self.persist,
                    error = %e,
                    "Backing store persist failed"
                );
                Err(CacheError::PersistFailure(e))
            }
        }
    }

    fn record_eviction(&self, record: Record<K, V>, reason: EvictionReason, now: u64) {
        debug!(key = ?record.key, %reason, "Evicted record");
        self.metrics.record_eviction(reason);
        self.events.append(record, now, EventKind::Eviction { reason });
    }

    pub(crate) fn events(&self) -> &EventLog<K, V> {
        &self.events
    }

    pub(crate) fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub(crate) fn evictor(&self) -> &Evictor {
        &self.evictor
    }

    pub(crate) fn persist_algorithm(&self) -> PersistAlgorithm {
        self.persist
    }

    pub(crate) fn write_behind(&self) -> &WriteBehind {
        &self.write_behind
    }

    pub(crate) async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub(crate) async fn contains(&self, key: &K) -> bool {
        self.store.read().await.contains(key)
    }

    pub(crate) async fn access_details(&self, key: &K) -> Option<AccessDetails> {
        self.store.read().await.get(key).map(|record| record.access)
    }

    pub(crate) async fn eviction_algorithm(&self) -> crate::config::EvictionAlgorithm {
        self.store.read().await.algorithm()
    }
}
