//! SSE (Server-Sent Events) streaming of live cache events.
//!
//! Converts a broadcast receiver of cache events into an SSE stream. Each
//! message carries the event's JSON form and uses the event kind as the SSE
//! event name.

use std::convert::Infallible;

use axum::response::sse::Event as SseEvent;
use futures::stream::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::warn;

use crate::cache::{Event, EventKind};

fn kind_name<K, V>(kind: &EventKind<K, V>) -> &'static str {
    match kind {
        EventKind::Load => "load",
        EventKind::Write => "write",
        EventKind::Update { .. } => "update",
        EventKind::Eviction { .. } => "eviction",
    }
}

/// Convert a live event receiver into an SSE stream.
///
/// A subscriber that falls too far behind skips the events it missed and
/// carries on from the oldest one still buffered.
pub fn events_to_sse_stream(
    rx: broadcast::Receiver<Event<String, String>>,
) -> impl Stream<Item = Result<SseEvent, Infallible>> {
    BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(SseEvent::default()
                .id(event.id.to_string())
                .event(kind_name(&event.kind))
                .data(data)))
        }
        Err(BroadcastStreamRecvError::Lagged(missed)) => {
            warn!(missed, "Event stream subscriber lagged");
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{EventLog, Record};

    #[tokio::test]
    async fn test_stream_yields_appended_events() {
        let log: EventLog<String, String> = EventLog::new(8);
        let mut stream = Box::pin(events_to_sse_stream(log.subscribe()));

        log.append(Record::new("a".into(), "1".into(), 5), 5, EventKind::Load);
        log.append(Record::new("a".into(), "1".into(), 5), 6, EventKind::Write);

        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_some());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_skips_missed_events() {
        let log: EventLog<String, String> = EventLog::new(1);
        let mut stream = Box::pin(events_to_sse_stream(log.subscribe()));

        for t in 0..3 {
            log.append(Record::new("k".into(), "v".into(), t), t, EventKind::Load);
        }
        drop(log);

        // Only the newest buffered event survives; the stream then ends.
        let mut received = 0;
        while let Some(item) = stream.next().await {
            assert!(item.is_ok());
            received += 1;
        }
        assert_eq!(received, 1);
    }
}
