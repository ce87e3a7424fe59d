use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version,
    query::json_contains,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Journal {
    events: Vec<EventEnvelope>,
    /// Survives `clear` so sequences are never reused.
    last_sequence: u64,
}

/// In-memory journal for tests and the database-less binary.
///
/// Events are kept in commit order; the write lock serializes appends so the
/// version check, the sequence assignment and the insert happen as one step.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    journal: Arc<RwLock<Journal>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn event_count(&self) -> usize {
        self.journal.read().await.events.len()
    }

    pub async fn clear(&self) {
        self.journal.write().await.events.clear();
    }

    fn matches(query: &EventQuery, event: &EventEnvelope) -> bool {
        if let Some(id) = query.aggregate_id
            && event.aggregate_id != id
        {
            return false;
        }
        if let Some(ref aggregate_type) = query.aggregate_type
            && &event.aggregate_type != aggregate_type
        {
            return false;
        }
        if let Some(ref types) = query.event_types
            && !types.contains(&event.event_type)
        {
            return false;
        }
        if let Some(ref fragment) = query.payload_contains
            && !json_contains(&event.payload, fragment)
        {
            return false;
        }
        if let Some(from) = query.from_timestamp
            && event.timestamp < from
        {
            return false;
        }
        if let Some(to) = query.to_timestamp
            && event.timestamp > to
        {
            return false;
        }
        true
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, events: Vec<EventEnvelope>, options: AppendOptions) -> Result<Version> {
        validate_events_for_append(&events)?;
        let aggregate_id = events[0].aggregate_id;
        let first_new_version = events[0].version;

        let mut journal = self.journal.write().await;

        let current_version = journal
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Mirrors the unique (aggregate_id, version) constraint of the SQL schema.
        if first_new_version != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: first_new_version,
                actual: current_version,
            });
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        for mut event in events {
            journal.last_sequence += 1;
            event.sequence = journal.last_sequence;
            journal.events.push(event);
        }

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let journal = self.journal.read().await;
        let mut events: Vec<_> = journal
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let journal = self.journal.read().await;
        let events = journal
            .events
            .iter()
            .filter(|e| Self::matches(&query, e))
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(events)
    }

    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        self.query_events(EventQuery::for_event_type(event_type))
            .await
    }

    async fn stream_events_after(&self, after: u64) -> Result<EventStream> {
        use futures_util::stream;

        let journal = self.journal.read().await;
        // Sequences are strictly increasing along the vector.
        let start = journal.events.partition_point(|e| e.sequence <= after);
        let events = journal.events[start..].to_vec();
        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let journal = self.journal.read().await;
        Ok(journal
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max())
    }
}
