use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected current version of the stream. `None` skips the check.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// The stream must not exist yet.
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// A stream of events.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventEnvelope>> + Send>>;

/// Durable, append-only journal of aggregate events.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a batch for one aggregate atomically.
    ///
    /// Fails with `ConcurrencyConflict` when `options.expected_version` is set
    /// and does not match the stream's current version. Returns the version
    /// of the stream after the append.
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version>;

    /// All events of one aggregate in version order.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Events matching a query, oldest first.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>>;

    /// Every event in the journal, in the order it was committed.
    async fn stream_all_events(&self) -> Result<EventStream> {
        self.stream_events_after(0).await
    }

    /// Events whose `sequence` is greater than `after`, in commit order.
    ///
    /// An event with a lower sequence never becomes visible after one with a
    /// higher sequence, so a reader may checkpoint on the last sequence seen.
    async fn stream_events_after(&self, after: u64) -> Result<EventStream>;

    /// `None` when the aggregate has no events.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;
}

/// Checks that a batch is non-empty, targets a single stream and carries
/// consecutive versions.
pub fn validate_events_for_append(events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Err(EventStoreError::InvalidAppend(
            "cannot append an empty batch".to_string(),
        ));
    };

    let mut expected_version = first.version;
    for event in events.iter().skip(1) {
        if event.aggregate_id != first.aggregate_id || event.aggregate_type != first.aggregate_type
        {
            return Err(EventStoreError::InvalidAppend(
                "all events in a batch must target the same aggregate".to_string(),
            ));
        }
        expected_version = expected_version.next();
        if event.version != expected_version {
            return Err(EventStoreError::InvalidAppend(format!(
                "event versions must be sequential: expected {expected_version}, got {}",
                event.version
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(aggregate_id: AggregateId, version: i64) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Order")
            .event_type("Test")
            .version(Version::new(version))
            .payload_raw(serde_json::json!({}))
            .build()
            .unwrap()
    }

    #[test]
    fn empty_batch_is_rejected() {
        assert!(matches!(
            validate_events_for_append(&[]),
            Err(EventStoreError::InvalidAppend(_))
        ));
    }

    #[test]
    fn gaps_are_rejected() {
        let id = AggregateId::new();
        let batch = vec![envelope(id, 1), envelope(id, 3)];
        assert!(validate_events_for_append(&batch).is_err());
    }

    #[test]
    fn mixed_aggregates_are_rejected() {
        let batch = vec![envelope(AggregateId::new(), 1), envelope(AggregateId::new(), 2)];
        assert!(validate_events_for_append(&batch).is_err());
    }

    #[test]
    fn sequential_batch_is_accepted() {
        let id = AggregateId::new();
        let batch = vec![envelope(id, 4), envelope(id, 5), envelope(id, 6)];
        assert!(validate_events_for_append(&batch).is_ok());
    }
}
