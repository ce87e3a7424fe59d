//! Projection error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// A journal payload did not decode into an order event.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
