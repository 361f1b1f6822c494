//! Sharded key-value cache.
//!
//! This module contains the core cache data structures and algorithms:
//! - [`record`]: Record, AccessDetails and priority keys
//! - [`index`]: Bucketed ordered indices (priority and expiry)
//! - [`store`]: Record map kept in step with both indices
//! - [`evictor`]: Expiry sweep and capacity-driven replacement
//! - [`events`]: Append-only event log with a live broadcast
//! - [`builder`]: Validated construction and warm-up
//! - [`handle`]: The public [`Cache`] handle

pub mod builder;
pub(crate) mod engine;
pub mod error;
pub mod events;
pub mod evictor;
pub mod handle;
pub mod index;
pub mod record;
pub mod store;

pub use builder::CacheBuilder;
pub use error::CacheError;
pub use events::{Event, EventId, EventKind, EventLog, EvictionReason};
pub use handle::{Cache, CacheStats};
pub use record::{AccessDetails, PriorityKey, Record};
