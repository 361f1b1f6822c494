//! kv-shard-cache: sharded async key-value cache over a backing store.
//!
//! Reads fall through to a [`Gateway`] on a miss; writes go to the cache and
//! are persisted write-through or write-back. Capacity is bounded by
//! expiry-first, then LRU/LFU replacement. Every state change lands in an
//! append-only event log.
//!
//! The binary wraps a `Cache<String, String>` backed by [`FileGateway`] in an
//! HTTP API.

pub mod cache;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod gateway;
pub mod metrics;
pub mod server;

pub use cache::{
    AccessDetails, Cache, CacheBuilder, CacheError, CacheStats, Event, EventKind, EvictionReason,
    Record,
};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{EvictionAlgorithm, PersistAlgorithm};
pub use gateway::{FileGateway, Gateway, GatewayError, MemoryGateway};
pub use metrics::CacheMetrics;
