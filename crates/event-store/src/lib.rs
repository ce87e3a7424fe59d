//! Append-only event journal used as the durable record of orders.
//!
//! Every order is a stream of events keyed by its [`AggregateId`]. Appends
//! carry an expected version so two writers racing on the same order cannot
//! both commit.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::EventQuery;
pub use store::{AppendOptions, EventStore, EventStream};
