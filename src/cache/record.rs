//! Cache records and their access metadata.
//!
//! A record is the unit the cache stores, indexes and evicts. Its
//! [`AccessDetails`] is the priority index's sort input and is replaced
//! wholesale on every access, never mutated in place.

use serde::Serialize;

use crate::config::EvictionAlgorithm;

/// Immutable recency/frequency metadata for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AccessDetails {
    /// Clock reading of the most recent access.
    pub last_access_time: u64,

    /// Number of accesses since the record was created.
    pub access_count: u64,
}

impl AccessDetails {
    /// Metadata for a record that has never been read.
    pub fn new(last_access_time: u64) -> Self {
        Self {
            last_access_time,
            access_count: 0,
        }
    }

    /// Metadata after one more access at `now`.
    ///
    /// A clock reading earlier than the previous access keeps the previous
    /// time so `last_access_time` never decreases for a key.
    #[must_use]
    pub fn update(self, now: u64) -> Self {
        Self {
            last_access_time: now.max(self.last_access_time),
            access_count: self.access_count + 1,
        }
    }

    /// Position of these details in the priority index under `algorithm`.
    pub fn priority_key(&self, algorithm: EvictionAlgorithm) -> PriorityKey {
        match algorithm {
            EvictionAlgorithm::Recency => PriorityKey(self.last_access_time, 0),
            EvictionAlgorithm::Frequency => PriorityKey(self.access_count, self.last_access_time),
        }
    }
}

/// Sort key of the priority index. Lowest is evicted first.
///
/// Details that compare equal under the active policy share a key and land in
/// the same bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PriorityKey(pub u64, pub u64);

/// A live cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record<K, V> {
    pub key: K,
    pub value: V,

    /// Clock reading when this record was created or replaced.
    pub insertion_time: u64,

    pub access: AccessDetails,
}

impl<K, V> Record<K, V> {
    /// A fresh, never-read record.
    pub fn new(key: K, value: V, insertion_time: u64) -> Self {
        Self {
            key,
            value,
            insertion_time,
            access: AccessDetails::new(insertion_time),
        }
    }

    /// Whether the record is older than `expiry_nanos` at `now`.
    pub fn has_expired(&self, now: u64, expiry_nanos: u64) -> bool {
        is_stale(self.insertion_time, now, expiry_nanos)
    }
}

/// Age check shared by records and the expiry index.
pub(crate) fn is_stale(insertion_time: u64, now: u64, expiry_nanos: u64) -> bool {
    now.saturating_sub(insertion_time) > expiry_nanos
}
