//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// How far into the journal a projection has folded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Journal sequence of the last event folded.
    pub last_sequence: u64,

    /// Number of events processed by this projection.
    pub events_processed: u64,
}

impl ProjectionPosition {
    pub fn zero() -> Self {
        Self::default()
    }

    /// Position after folding the event stored at `sequence`.
    pub fn advance(&self, sequence: u64) -> Self {
        Self {
            last_sequence: self.last_sequence.max(sequence),
            events_processed: self.events_processed + 1,
        }
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "position(seq {}, {} events)",
            self.last_sequence, self.events_processed
        )
    }
}

/// Folds journal events, in commit order, into a read model.
///
/// `handle` must advance the position to the event's `sequence` for every
/// event it is given, including events it ignores, so catch-up can resume
/// after the last folded sequence.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    async fn position(&self) -> ProjectionPosition;

    /// Drops everything folded so far.
    async fn reset(&self) -> Result<()>;
}
