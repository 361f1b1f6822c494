//! Prometheus counters for cache activity.
//!
//! Each cache owns its own [`Registry`], so several caches in one process
//! (or one test binary) never collide on metric names.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::cache::events::EvictionReason;

#[derive(Debug, Clone)]
pub struct CacheMetrics {
    registry: Registry,
    hits: IntCounter,
    misses: IntCounter,
    loads: IntCounter,
    load_failures: IntCounter,
    writes: IntCounter,
    persist_failures: IntCounter,
    evictions: IntCounterVec,
}

impl CacheMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let hits = IntCounter::new("cache_hits_total", "Reads served from a live record")?;
        registry.register(Box::new(hits.clone()))?;

        let misses = IntCounter::new("cache_misses_total", "Reads that went to the backing store")?;
        registry.register(Box::new(misses.clone()))?;

        let loads = IntCounter::new("cache_loads_total", "Successful backing store loads")?;
        registry.register(Box::new(loads.clone()))?;

        let load_failures = IntCounter::new("cache_load_failures_total", "Failed backing store loads")?;
        registry.register(Box::new(load_failures.clone()))?;

        let writes = IntCounter::new("cache_writes_total", "Successful backing store persists")?;
        registry.register(Box::new(writes.clone()))?;

        let persist_failures =
            IntCounter::new("cache_persist_failures_total", "Failed backing store persists")?;
        registry.register(Box::new(persist_failures.clone()))?;

        let evictions = IntCounterVec::new(
            Opts::new("cache_evictions_total", "Records removed from the cache"),
            &["reason"],
        )?;
        registry.register(Box::new(evictions.clone()))?;

        Ok(Self {
            registry,
            hits,
            misses,
            loads,
            load_failures,
            writes,
            persist_failures,
            evictions,
        })
    }

    pub fn record_hit(&self) {
        self.hits.inc();
    }

    pub fn record_miss(&self) {
        self.misses.inc();
    }

    pub fn record_load(&self, ok: bool) {
        if ok {
            self.loads.inc();
        } else {
            self.load_failures.inc();
        }
    }

    pub fn record_persist(&self, ok: bool) {
        if ok {
            self.writes.inc();
        } else {
            self.persist_failures.inc();
        }
    }

    pub fn record_eviction(&self, reason: EvictionReason) {
        self.evictions
            .with_label_values(&[reason.to_string().as_str()])
            .inc();
    }

    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    pub fn misses(&self) -> u64 {
        self.misses.get()
    }

    pub fn persist_failures(&self) -> u64 {
        self.persist_failures.get()
    }

    pub fn evictions(&self, reason: EvictionReason) -> u64 {
        self.evictions
            .with_label_values(&[reason.to_string().as_str()])
            .get()
    }

    /// Render every counter in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
