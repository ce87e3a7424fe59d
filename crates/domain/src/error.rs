//! Domain error types.

use event_store::EventStoreError;
use thiserror::Error;

use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Event store error: {0}")]
    EventStore(#[from] EventStoreError),

    /// The order rejected the command.
    #[error("Order error: {0}")]
    Order(OrderError),

    #[error("Aggregate not found: {aggregate_type} with id {aggregate_id}")]
    AggregateNotFound {
        aggregate_type: &'static str,
        aggregate_id: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// True when another writer committed to the stream first.
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::EventStore(e) if e.is_conflict())
    }
}
