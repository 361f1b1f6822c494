//! Record store: the key map plus the two indices that order it.
//!
//! Every method keeps the three structures consistent with each other: a key
//! is either absent everywhere or present in the map and in exactly one
//! bucket of each index. Callers hold the store behind a single lock, so
//! half-applied updates are never visible.

use std::collections::HashMap;
use std::hash::Hash;

use crate::cache::index::{ExpiryIndex, PriorityIndex};
use crate::cache::record::{is_stale, AccessDetails, Record};
use crate::config::EvictionAlgorithm;

#[derive(Debug)]
pub struct RecordStore<K, V> {
    records: HashMap<K, Record<K, V>>,
    priority: PriorityIndex<K>,
    expiry: ExpiryIndex<K>,
    algorithm: EvictionAlgorithm,
}

impl<K, V> RecordStore<K, V>
where
    K: Hash + Eq + Clone,
{
    pub fn new(algorithm: EvictionAlgorithm) -> Self {
        Self {
            records: HashMap::new(),
            priority: PriorityIndex::new(),
            expiry: ExpiryIndex::new(),
            algorithm,
        }
    }

    pub fn algorithm(&self) -> EvictionAlgorithm {
        self.algorithm
    }

    pub fn get(&self, key: &K) -> Option<&Record<K, V>> {
        self.records.get(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Publish a record into the map and both indices.
    ///
    /// Any record already stored under the key is unlinked first and returned.
    pub fn insert(&mut self, record: Record<K, V>) -> Option<Record<K, V>> {
        let previous = self.remove(&record.key);

        self.expiry.insert(record.insertion_time, record.key.clone());
        self.priority.insert(
            record.access.priority_key(self.algorithm),
            record.key.clone(),
        );
        self.records.insert(record.key.clone(), record);

        previous
    }

    /// Unlink a record from the map and both indices.
    pub fn remove(&mut self, key: &K) -> Option<Record<K, V>> {
        let record = self.records.remove(key)?;
        self.unlink(&record);
        Some(record)
    }

    /// Record an access: swap the key's access details for `update(now)` and
    /// move it to the matching priority bucket.
    pub fn touch(&mut self, key: &K, now: u64) -> Option<&Record<K, V>> {
        let algorithm = self.algorithm;
        let record = self.records.get_mut(key)?;

        let previous: AccessDetails = record.access;
        let updated = previous.update(now);
        self.priority.remove(previous.priority_key(algorithm), key);
        self.priority.insert(updated.priority_key(algorithm), key.clone());
        record.access = updated;

        Some(record)
    }

    /// Insertion time of the oldest record.
    pub fn oldest_insertion(&self) -> Option<u64> {
        self.expiry.peek_first()
    }

    /// Whether the oldest record is older than `expiry_nanos` at `now`.
    pub fn oldest_is_stale(&self, now: u64, expiry_nanos: u64) -> bool {
        self.oldest_insertion()
            .is_some_and(|inserted| is_stale(inserted, now, expiry_nanos))
    }

    /// Remove every record sharing the oldest insertion time.
    pub fn pop_oldest(&mut self) -> Vec<Record<K, V>> {
        let Some((_, keys)) = self.expiry.pop_first() else {
            return Vec::new();
        };

        keys.into_iter()
            .filter_map(|key| {
                let record = self.records.remove(&key)?;
                self.priority
                    .remove(record.access.priority_key(self.algorithm), &key);
                Some(record)
            })
            .collect()
    }

    /// Remove the single lowest-priority record; the earliest-inserted key
    /// wins ties within a bucket.
    pub fn pop_lowest_priority(&mut self) -> Option<Record<K, V>> {
        let key = self.priority.first_key().map(|(_, key)| key.clone())?;
        self.remove(&key)
    }

    /// Key that [`pop_lowest_priority`](Self::pop_lowest_priority) would evict.
    pub fn lowest_priority_key(&self) -> Option<&K> {
        self.priority.first_key().map(|(_, key)| key)
    }

    /// Snapshot of every live record, in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &Record<K, V>> {
        self.records.values()
    }

    fn unlink(&mut self, record: &Record<K, V>) {
        self.priority
            .remove(record.access.priority_key(self.algorithm), &record.key);
        self.expiry.remove(record.insertion_time, &record.key);
    }

    /// Check the cross-structure invariant. Test helper.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        self.priority.len() == self.records.len()
            && self.expiry.len() == self.records.len()
            && self.records.values().all(|r| {
                self.priority
                    .contains(r.access.priority_key(self.algorithm), &r.key)
                    && self.expiry.contains(r.insertion_time, &r.key)
            })
    }
}
