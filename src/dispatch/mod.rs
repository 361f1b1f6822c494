//! Per-key serialization of cache operations.
//!
//! - [`shard`]: fixed pool of serial workers addressed by `hash(key) mod N`
//! - [`write_behind`]: per-shard queues for deferred persistence

pub mod shard;
pub mod write_behind;

use std::future::Future;
use std::pin::Pin;

pub use shard::{DispatchStats, ShardDispatcher};
pub use write_behind::WriteBehind;

/// A unit of work queued on a shard worker.
pub type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
