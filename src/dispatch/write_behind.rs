//! Deferred persistence queues for write-back mode.
//!
//! Persists are queued per key shard and run serially, so the backing store
//! sees writes for a key in the same order the cache accepted them. Nobody
//! awaits a deferred persist; failures are reported by the job itself.

use std::future::Future;
use std::hash::Hash;

use tracing::warn;

use crate::dispatch::shard::{DispatchError, ShardDispatcher};

#[derive(Debug)]
pub struct WriteBehind {
    queues: ShardDispatcher,
}

impl WriteBehind {
    pub fn new(pool_size: usize) -> Self {
        Self {
            queues: ShardDispatcher::new("write-behind", pool_size),
        }
    }

    /// Queue a persist for `key` behind earlier persists for the same key.
    pub fn enqueue<Q, F>(&self, key: &Q, persist: F)
    where
        Q: Hash + ?Sized,
        F: Future<Output = ()> + Send + 'static,
    {
        if let Err(e) = self.queues.submit(key, Box::pin(persist)) {
            warn!(error = %e, "Dropped deferred persist");
        }
    }

    /// Wait for every persist queued before this call.
    pub async fn flush(&self) -> Result<(), DispatchError> {
        self.queues.drain().await
    }

    /// Persists queued or in flight.
    pub fn pending(&self) -> u64 {
        (0..self.queues.shard_count())
            .map(|shard| self.queues.stats().pending(shard))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn test_persists_for_one_key_keep_order() {
        let write_behind = WriteBehind::new(4);
        let seen = Arc::new(Mutex::new(Vec::new()));

        for version in 0..10u64 {
            let seen = Arc::clone(&seen);
            write_behind.enqueue("k", async move {
                tokio::time::sleep(Duration::from_millis(10 - version)).await;
                seen.lock().unwrap().push(version);
            });
        }

        write_behind.flush().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), (0..10).collect::<Vec<_>>());
    }
}
