//! Shard dispatcher: routes work for a key to one of N serial workers.
//!
//! Each worker is a tokio task draining its own queue one job at a time, so
//! two jobs for the same key never interleave and run in dispatch order,
//! while keys on different shards proceed concurrently.

use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use futures::future::join_all;
use futures::FutureExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::dispatch::Job;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("shard worker {0} is no longer running")]
    ShardClosed(usize),

    #[error("operation on shard {0} panicked")]
    Aborted(usize),
}

/// Per-shard job counters.
#[derive(Debug)]
pub struct DispatchStats {
    dispatched: Box<[AtomicU64]>,
    completed: Box<[AtomicU64]>,
}

impl DispatchStats {
    fn new(shards: usize) -> Self {
        Self {
            dispatched: (0..shards).map(|_| AtomicU64::new(0)).collect(),
            completed: (0..shards).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Jobs accepted by each shard so far.
    pub fn dispatched(&self) -> Vec<u64> {
        self.dispatched
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Jobs finished by each shard so far.
    pub fn completed(&self) -> Vec<u64> {
        self.completed
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }

    /// Jobs queued or running on `shard`.
    pub fn pending(&self, shard: usize) -> u64 {
        let dispatched = self.dispatched.get(shard).map_or(0, |c| c.load(Ordering::Acquire));
        let completed = self.completed.get(shard).map_or(0, |c| c.load(Ordering::Acquire));
        dispatched.saturating_sub(completed)
    }
}

/// Fixed pool of serial workers addressed by key hash.
#[derive(Debug)]
pub struct ShardDispatcher {
    name: &'static str,
    queues: Vec<mpsc::UnboundedSender<Job>>,
    hasher: RandomState,
    stats: Arc<DispatchStats>,
}

impl ShardDispatcher {
    /// Spawn `pool_size` workers on the current tokio runtime.
    ///
    /// `pool_size` is clamped to at least one worker.
    pub fn new(name: &'static str, pool_size: usize) -> Self {
        let pool_size = pool_size.max(1);
        let stats = Arc::new(DispatchStats::new(pool_size));

        let queues = (0..pool_size)
            .map(|index| {
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(run_worker(name, index, rx, Arc::clone(&stats)));
                tx
            })
            .collect();

        debug!(pool = name, workers = pool_size, "Started shard workers");

        Self {
            name,
            queues,
            hasher: RandomState::new(),
            stats,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.queues.len()
    }

    /// Shard that owns `key`.
    pub fn shard_for<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        (self.hasher.hash_one(key) % self.queues.len() as u64) as usize
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }

    /// Queue `job` on the shard owning `key` without waiting for it.
    pub fn submit<Q: Hash + ?Sized>(&self, key: &Q, job: Job) -> Result<(), DispatchError> {
        let shard = self.shard_for(key);
        self.submit_to(shard, job)
    }

    /// Run `op` on the shard owning `key` and wait for its output.
    pub async fn dispatch<Q, T, F>(&self, key: &Q, op: F) -> Result<T, DispatchError>
    where
        Q: Hash + ?Sized,
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
    {
        let shard = self.shard_for(key);
        let (tx, rx) = oneshot::channel();

        self.submit_to(
            shard,
            Box::pin(async move {
                // The caller may have gone away; the work still counts.
                let _ = tx.send(op.await);
            }),
        )?;

        rx.await.map_err(|_| DispatchError::Aborted(shard))
    }

    /// Wait until every job queued before this call, on every shard, is done.
    pub async fn drain(&self) -> Result<(), DispatchError> {
        let barriers = (0..self.queues.len()).map(|shard| {
            let (tx, rx) = oneshot::channel::<()>();
            let queued = self.submit_to(
                shard,
                Box::pin(async move {
                    let _ = tx.send(());
                }),
            );
            async move {
                queued?;
                rx.await.map_err(|_| DispatchError::Aborted(shard))
            }
        });

        join_all(barriers).await.into_iter().collect()
    }

    fn submit_to(&self, shard: usize, job: Job) -> Result<(), DispatchError> {
        // Counted before the send so the worker can never complete it first.
        self.stats.dispatched[shard].fetch_add(1, Ordering::AcqRel);
        if self.queues[shard].send(job).is_err() {
            self.stats.dispatched[shard].fetch_sub(1, Ordering::AcqRel);
            return Err(DispatchError::ShardClosed(shard));
        }
        Ok(())
    }
}

async fn run_worker(
    name: &'static str,
    index: usize,
    mut rx: mpsc::UnboundedReceiver<Job>,
    stats: Arc<DispatchStats>,
) {
    while let Some(job) = rx.recv().await {
        // A panicking job must not take the shard down with it.
        if AssertUnwindSafe(job).catch_unwind().await.is_err() {
            error!(pool = name, shard = index, "Job panicked");
        }
        stats.completed[index].fetch_add(1, Ordering::AcqRel);
    }
    debug!(pool = name, shard = index, "Shard worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_runs_in_dispatch_order() {
        let dispatcher = ShardDispatcher::new("test", 4);
        let log = Arc::new(Mutex::new(Vec::new()));

        let mut pending = Vec::new();
        for i in 0..20u64 {
            let log = Arc::clone(&log);
            // Earlier jobs sleep longer; ordering must still hold.
            pending.push(dispatcher.dispatch("key", async move {
                tokio::time::sleep(Duration::from_millis(20 - i)).await;
                log.lock().unwrap().push(i);
            }));
        }
        join_all(pending).await;

        assert_eq!(*log.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_dispatch_returns_output() {
        let dispatcher = ShardDispatcher::new("test", 2);
        let out = dispatcher.dispatch(&7u32, async { 21 * 2 }).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn test_shard_for_is_stable_and_in_range() {
        let dispatcher = ShardDispatcher::new("test", 3);
        for key in 0..100u32 {
            let shard = dispatcher.shard_for(&key);
            assert!(shard < 3);
            assert_eq!(shard, dispatcher.shard_for(&key));
        }
    }

    #[tokio::test]
    async fn test_different_shards_run_concurrently() {
        let dispatcher = ShardDispatcher::new("test", 8);
        let a = 0u32;
        let b = (1..1000u32)
            .find(|k| dispatcher.shard_for(k) != dispatcher.shard_for(&a))
            .unwrap();

        // `a` blocks until `b` has run; this only finishes if they are independent.
        let (tx, rx) = oneshot::channel::<()>();
        let first = dispatcher.dispatch(&a, async move { rx.await.is_ok() });
        let second = dispatcher.dispatch(&b, async move { tx.send(()).is_ok() });

        let (first, second) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(first, second)
        })
        .await
        .unwrap();
        assert!(first.unwrap());
        assert!(second.unwrap());
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_worker_alive() {
        let dispatcher = ShardDispatcher::new("test", 1);
        let result = dispatcher
            .dispatch("k", async {
                panic!("boom");
            })
            .await;
        assert_eq!(result, Err::<(), _>(DispatchError::Aborted(0)));

        let out = dispatcher.dispatch("k", async { 1 }).await.unwrap();
        assert_eq!(out, 1);
    }

    #[tokio::test]
    async fn test_drain_waits_for_submitted_jobs() {
        let dispatcher = ShardDispatcher::new("test", 2);
        let done = Arc::new(AtomicU64::new(0));

        for key in 0..10u32 {
            let done = Arc::clone(&done);
            dispatcher
                .submit(
                    &key,
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        done.fetch_add(1, Ordering::SeqCst);
                    }),
                )
                .unwrap();
        }

        dispatcher.drain().await.unwrap();
        assert_eq!(done.load(Ordering::SeqCst), 10);
        // Ten jobs plus one barrier per shard were accepted.
        assert_eq!(dispatcher.stats().dispatched().iter().sum::<u64>(), 12);
        assert!(dispatcher.stats().completed().iter().sum::<u64>() >= 10);
    }

    #[tokio::test]
    async fn test_pending_never_undercounts_running_job() {
        let dispatcher = ShardDispatcher::new("test", 1);
        let (started_tx, started_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        dispatcher
            .submit(
                "k",
                Box::pin(async move {
                    let _ = started_tx.send(());
                    let _ = release_rx.await;
                }),
            )
            .unwrap();

        started_rx.await.unwrap();
        assert_eq!(dispatcher.stats().pending(0), 1);

        release_tx.send(()).unwrap();
        dispatcher.drain().await.unwrap();
        assert!(dispatcher.stats().pending(0) <= 1);

        for _ in 0..100 {
            dispatcher.submit("k", Box::pin(async {})).unwrap();
            let dispatched = dispatcher.stats().dispatched()[0];
            let completed = dispatcher.stats().completed()[0];
            assert!(completed <= dispatched);
        }
    }

    #[tokio::test]
    async fn test_submit_to_stopped_worker_is_not_counted() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let dispatcher = ShardDispatcher {
            name: "test",
            queues: vec![tx],
            hasher: RandomState::new(),
            stats: Arc::new(DispatchStats::new(1)),
        };

        let result = dispatcher.submit("k", Box::pin(async {}));
        assert_eq!(result, Err(DispatchError::ShardClosed(0)));
        assert_eq!(dispatcher.stats().dispatched(), vec![0]);
        assert_eq!(dispatcher.stats().pending(0), 0);
    }
}
