//! Ordered bucket indices over cache keys.
//!
//! Several records can share a sort key (same access details, same insertion
//! nanosecond), so each sort key maps to a bucket of keys kept in insertion
//! order. Iterating a bucket front to back gives a deterministic tie-break.
//!
//! - [`PriorityIndex`]: sorted by [`PriorityKey`], lowest is the eviction candidate
//! - [`ExpiryIndex`]: sorted by insertion time, lowest is the oldest record

use std::collections::{BTreeMap, VecDeque};

use crate::cache::record::PriorityKey;

/// A `BTreeMap` of sort key to insertion-ordered bucket of keys.
#[derive(Debug)]
pub struct BucketIndex<S, K> {
    buckets: BTreeMap<S, VecDeque<K>>,
    len: usize,
}

pub type PriorityIndex<K> = BucketIndex<PriorityKey, K>;
pub type ExpiryIndex<K> = BucketIndex<u64, K>;

impl<S: Ord + Copy, K: PartialEq> BucketIndex<S, K> {
    pub fn new() -> Self {
        Self {
            buckets: BTreeMap::new(),
            len: 0,
        }
    }

    /// Append `key` to the bucket for `sort`, creating the bucket if needed.
    pub fn insert(&mut self, sort: S, key: K) {
        self.buckets.entry(sort).or_default().push_back(key);
        self.len += 1;
    }

    /// Remove `key` from the bucket for `sort`, dropping the bucket once empty.
    ///
    /// Returns `false` if the key was not in that bucket.
    pub fn remove(&mut self, sort: S, key: &K) -> bool {
        let Some(bucket) = self.buckets.get_mut(&sort) else {
            return false;
        };
        let Some(pos) = bucket.iter().position(|k| k == key) else {
            return false;
        };

        bucket.remove(pos);
        if bucket.is_empty() {
            self.buckets.remove(&sort);
        }
        self.len -= 1;
        true
    }

    /// Lowest sort key with a non-empty bucket.
    pub fn peek_first(&self) -> Option<S> {
        self.buckets
            .iter()
            .find(|(_, bucket)| !bucket.is_empty())
            .map(|(sort, _)| *sort)
    }

    /// First key of the lowest bucket.
    pub fn first_key(&self) -> Option<(S, &K)> {
        self.buckets
            .iter()
            .find_map(|(sort, bucket)| bucket.front().map(|key| (*sort, key)))
    }

    /// Remove and return the lowest non-empty bucket, skipping empty ones.
    pub fn pop_first(&mut self) -> Option<(S, VecDeque<K>)> {
        while let Some((sort, bucket)) = self.buckets.pop_first() {
            if !bucket.is_empty() {
                self.len -= bucket.len();
                return Some((sort, bucket));
            }
        }
        None
    }

    /// Number of keys across all buckets.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct sort keys.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Whether `key` sits in the bucket for `sort`.
    pub fn contains(&self, sort: S, key: &K) -> bool {
        self.buckets
            .get(&sort)
            .is_some_and(|bucket| bucket.contains(key))
    }
}

impl<S: Ord + Copy, K: PartialEq> Default for BucketIndex<S, K> {
    fn default() -> Self {
        Self::new()
    }
}
