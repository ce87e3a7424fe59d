//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact that happened to an aggregate. Named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Event name stored alongside the payload and used for filtering.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced entity.
///
/// Aggregates are rebuilt by replaying their events, decide on new events in
/// pure command methods, and change state only through [`Aggregate::apply`].
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Stream family name, e.g. `"Order"`.
    fn aggregate_type() -> &'static str;

    /// `None` until the creating event has been applied.
    fn id(&self) -> Option<AggregateId>;

    /// Version 0 for a new aggregate, incremented by each event.
    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    /// Applies an event. Must be deterministic and must not fail: events
    /// are facts that have already happened.
    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}
