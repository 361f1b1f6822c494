//! Append-only log of externally visible cache mutations.
//!
//! Every load, persisted write, update and eviction appends exactly one
//! [`Event`], in the order the mutation became visible. The log is never
//! compacted. Readers take snapshots; live listeners can
//! [`subscribe`](EventLog::subscribe) to events appended afterwards.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::cache::record::Record;

/// Unique, monotonically increasing event identifier.
pub type EventId = u64;

/// Why a record left the cache without a replacement value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Older than the configured expiry time.
    Expiry,
    /// Lowest priority when the cache was full.
    Replacement,
}

impl std::fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionReason::Expiry => write!(f, "expiry"),
            EvictionReason::Replacement => write!(f, "replacement"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind<K, V> {
    /// Record fetched from the backing store.
    Load,
    /// Record persisted to the backing store.
    Write,
    /// Live record replaced by `set`.
    Update { previous: Record<K, V> },
    /// Record removed.
    Eviction { reason: EvictionReason },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event<K, V> {
    pub id: EventId,
    /// Snapshot of the record the event is about.
    pub record: Record<K, V>,
    /// Clock reading when the event was appended.
    pub timestamp: u64,
    #[serde(flatten)]
    pub kind: EventKind<K, V>,
}

impl<K, V> Event<K, V> {
    pub fn is_load(&self) -> bool {
        matches!(self.kind, EventKind::Load)
    }

    pub fn is_write(&self) -> bool {
        matches!(self.kind, EventKind::Write)
    }

    pub fn is_update(&self) -> bool {
        matches!(self.kind, EventKind::Update { .. })
    }

    /// The eviction reason, if this is an eviction.
    pub fn eviction_reason(&self) -> Option<EvictionReason> {
        match self.kind {
            EventKind::Eviction { reason } => Some(reason),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct LogInner<K, V> {
    events: Vec<Event<K, V>>,
    next_id: EventId,
}

/// Concurrently appendable event sequence.
#[derive(Debug)]
pub struct EventLog<K, V> {
    inner: Mutex<LogInner<K, V>>,
    live: broadcast::Sender<Event<K, V>>,
}

impl<K: Clone, V: Clone> EventLog<K, V> {
    /// Create an empty log. `stream_capacity` bounds how far a live
    /// subscriber may lag before it starts missing events.
    pub fn new(stream_capacity: usize) -> Self {
        let (live, _) = broadcast::channel(stream_capacity.max(1));
        Self {
            inner: Mutex::new(LogInner {
                events: Vec::new(),
                next_id: 0,
            }),
            live,
        }
    }

    /// Append one event and return its id.
    pub fn append(&self, record: Record<K, V>, timestamp: u64, kind: EventKind<K, V>) -> EventId {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;

        let event = Event {
            id,
            record,
            timestamp,
            kind,
        };
        // No subscribers is fine.
        let _ = self.live.send(event.clone());
        inner.events.push(event);
        id
    }

    /// Copy of every event appended so far, oldest first.
    pub fn snapshot(&self) -> Vec<Event<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .events
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Receive events appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event<K, V>> {
        self.live.subscribe()
    }
}
