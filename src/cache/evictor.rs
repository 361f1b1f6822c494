//! Capacity enforcement: decides which records leave before an insertion.
//!
//! Runs in two passes over a [`RecordStore`]:
//! 1. Expired records, oldest insertion bucket first, while the store is full
//! 2. Lowest-priority records under the configured policy, one at a time,
//!    while the store is still full
//!
//! Expired records are therefore always preferred over merely cold live ones.

use std::hash::Hash;
use std::time::Duration;

use tracing::debug;

use crate::cache::events::EvictionReason;
use crate::cache::record::Record;
use crate::cache::store::RecordStore;

/// A record removed by the evictor and the reason it was chosen.
#[derive(Debug, Clone)]
pub struct EvictionCandidate<K, V> {
    pub record: Record<K, V>,
    pub reason: EvictionReason,
}

/// The eviction coordinator.
#[derive(Debug, Clone)]
pub struct Evictor {
    maximum_size: usize,
    expiry_nanos: u64,
}

impl Evictor {
    pub fn new(maximum_size: usize, expiry_time: Duration) -> Self {
        Self {
            maximum_size,
            expiry_nanos: u64::try_from(expiry_time.as_nanos()).unwrap_or(u64::MAX),
        }
    }

    pub fn maximum_size(&self) -> usize {
        self.maximum_size
    }

    pub fn expiry_nanos(&self) -> u64 {
        self.expiry_nanos
    }

    /// Remove records until one more insertion fits under `maximum_size`.
    ///
    /// Returns the victims in removal order. The caller must hold the
    /// capacity section so concurrent insertions cannot both see room.
    pub fn make_room<K, V>(
        &self,
        store: &mut RecordStore<K, V>,
        now: u64,
    ) -> Vec<EvictionCandidate<K, V>>
    where
        K: Hash + Eq + Clone,
    {
        let mut victims = Vec::new();

        while store.len() >= self.maximum_size && store.oldest_is_stale(now, self.expiry_nanos) {
            for record in store.pop_oldest() {
                victims.push(EvictionCandidate {
                    record,
                    reason: EvictionReason::Expiry,
                });
            }
        }

        while store.len() >= self.maximum_size {
            let Some(record) = store.pop_lowest_priority() else {
                break;
            };
            victims.push(EvictionCandidate {
                record,
                reason: EvictionReason::Replacement,
            });
        }

        if !victims.is_empty() {
            debug!(
                evicted = victims.len(),
                remaining = store.len(),
                maximum = self.maximum_size,
                "Made room for insertion"
            );
        }

        victims
    }
}
