//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    pub new_version: Version,
}

/// An intention to change one aggregate. May be rejected by its current state.
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    fn aggregate_id(&self) -> AggregateId;
}

/// Loads an aggregate from its events, runs a command against it and appends
/// the resulting events with an expected-version check.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Replays the aggregate's events. A stream with no events yields
    /// `A::default()`.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let events = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in events {
            let event: A::Event = envelope.decode()?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning `None` if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.id().is_some().then_some(aggregate))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function sees the current state and returns the events to
    /// append, or an error. An empty event list is a successful no-op.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(aggregate_id, current_version, &events)?;

        let options = if current_version == Version::initial() {
            AppendOptions::expect_new()
        } else {
            AppendOptions::expect_version(current_version)
        };

        let new_version = self.store.append(envelopes, options).await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    /// Like [`execute`](Self::execute), but reloads and re-validates when a
    /// concurrent writer wins the race, up to `max_attempts` tries in total.
    ///
    /// Rejections by the aggregate are never retried.
    pub async fn execute_with_retry<F>(
        &self,
        aggregate_id: AggregateId,
        max_attempts: usize,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: Fn(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut attempt = 1;
        loop {
            match self.execute(aggregate_id, &command_fn).await {
                Err(e) if e.is_conflict() && attempt < max_attempts => {
                    metrics::counter!("command_conflict_retries_total").increment(1);
                    tracing::debug!(%aggregate_id, attempt, "version conflict, retrying");
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let envelope = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?
                .build()?;
            envelopes.push(envelope);
        }

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use event_store::{EventQuery, EventStoreError, EventStream, InMemoryEventStore};
    use serde::{Deserialize, Serialize};
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TallyEvent {
        Opened { name: String },
        Set { value: i32 },
    }

    impl DomainEvent for TallyEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TallyEvent::Opened { .. } => "TallyOpened",
                TallyEvent::Set { .. } => "TallySet",
            }
        }
    }

    #[derive(Debug, Default, Clone)]
    struct Tally {
        id: Option<AggregateId>,
        name: String,
        value: i32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    enum TallyError {
        #[error("invalid value: {0}")]
        InvalidValue(i32),
    }

    impl Aggregate for Tally {
        type Event = TallyEvent;
        type Error = TallyError;

        fn aggregate_type() -> &'static str {
            "Tally"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TallyEvent::Opened { name } => {
                    if self.id.is_none() {
                        self.id = Some(AggregateId::new());
                    }
                    self.name = name;
                }
                TallyEvent::Set { value } => self.value = value,
            }
        }
    }

    impl From<TallyError> for DomainError {
        fn from(e: TallyError) -> Self {
            DomainError::AggregateNotFound {
                aggregate_type: "Tally",
                aggregate_id: e.to_string(),
            }
        }
    }

    fn opened() -> Vec<TallyEvent> {
        vec![TallyEvent::Opened {
            name: "Tally".to_string(),
        }]
    }

    #[tokio::test]
    async fn execute_creates_aggregate() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        let result = handler.execute(id, |_| Ok(opened())).await.unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.name, "Tally");
    }

    #[tokio::test]
    async fn execute_appends_to_existing_stream() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        handler.execute(id, |_| Ok(opened())).await.unwrap();
        let result = handler
            .execute(id, |_| Ok(vec![TallyEvent::Set { value: 42 }]))
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.value, 42);

        let reloaded = handler.load(id).await.unwrap();
        assert_eq!(reloaded.value, 42);
        assert_eq!(reloaded.version(), Version::new(2));
    }

    #[tokio::test]
    async fn rejected_command_persists_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());

        let result = handler
            .execute(AggregateId::new(), |_| Err(TallyError::InvalidValue(-1)))
            .await;

        assert!(result.is_err());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn load_existing_distinguishes_missing_streams() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        assert!(handler.load_existing(id).await.unwrap().is_none());
        handler.execute(id, |_| Ok(opened())).await.unwrap();
        assert_eq!(handler.load_existing(id).await.unwrap().unwrap().name, "Tally");
    }

    #[tokio::test]
    async fn empty_events_returns_without_persisting() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Tally> = CommandHandler::new(store.clone());

        let result = handler
            .execute(AggregateId::new(), |_| Ok(vec![]))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    /// Reports a conflict for the first `failures` appends, then delegates.
    #[derive(Clone)]
    struct FlakyStore {
        inner: InMemoryEventStore,
        failures: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl EventStore for FlakyStore {
        async fn append(
            &self,
            events: Vec<EventEnvelope>,
            options: AppendOptions,
        ) -> event_store::Result<Version> {
            let mut failures = self.failures.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(EventStoreError::ConcurrencyConflict {
                    aggregate_id: events[0].aggregate_id,
                    expected: options.expected_version.unwrap_or_default(),
                    actual: Version::new(99),
                });
            }
            self.inner.append(events, options).await
        }

        async fn get_events_for_aggregate(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_for_aggregate(aggregate_id).await
        }

        async fn query_events(&self, query: EventQuery) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.query_events(query).await
        }

        async fn get_events_by_type(
            &self,
            event_type: &str,
        ) -> event_store::Result<Vec<EventEnvelope>> {
            self.inner.get_events_by_type(event_type).await
        }

        async fn stream_events_after(&self, after: u64) -> event_store::Result<EventStream> {
            self.inner.stream_events_after(after).await
        }

        async fn get_aggregate_version(
            &self,
            aggregate_id: AggregateId,
        ) -> event_store::Result<Option<Version>> {
            self.inner.get_aggregate_version(aggregate_id).await
        }
    }

    fn flaky(failures: usize) -> FlakyStore {
        FlakyStore {
            inner: InMemoryEventStore::new(),
            failures: Arc::new(Mutex::new(failures)),
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_conflicts() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(flaky(2));

        let result = handler
            .execute_with_retry(AggregateId::new(), 3, |_| Ok(opened()))
            .await
            .unwrap();
        assert_eq!(result.new_version, Version::first());
    }

    #[tokio::test]
    async fn retry_gives_up_after_max_attempts() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(flaky(3));

        let result = handler
            .execute_with_retry(AggregateId::new(), 3, |_| Ok(opened()))
            .await;
        assert!(result.unwrap_err().is_conflict());
    }

    #[tokio::test]
    async fn retry_does_not_repeat_rejections() {
        let handler: CommandHandler<_, Tally> = CommandHandler::new(flaky(0));
        let calls = std::sync::atomic::AtomicUsize::new(0);

        let result = handler
            .execute_with_retry(AggregateId::new(), 3, |_| {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(TallyError::InvalidValue(0))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
