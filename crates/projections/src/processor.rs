//! Feeds journal events to projections.

use event_store::{EventEnvelope, EventStore};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Delivers journal events to every registered projection.
///
/// Catch-up is incremental: each projection remembers the journal sequence
/// it last folded, and only the tail after the lowest checkpoint is read, so
/// a read path can call [`run_catch_up`](Self::run_catch_up) before every
/// query. Catch-ups are serialized so no event is folded twice.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    catch_up: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            catch_up: Mutex::new(()),
        }
    }

    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Streams the journal after the lowest checkpoint and hands each
    /// projection the events past its own. Returns how many events were
    /// delivered.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _guard = self.catch_up.lock().await;

        let mut checkpoints = Vec::with_capacity(self.projections.len());
        for projection in &self.projections {
            checkpoints.push(projection.position().await.last_sequence);
        }
        let Some(from) = checkpoints.iter().copied().min() else {
            return Ok(0);
        };

        let mut stream = self.store.stream_events_after(from).await?;
        let mut delivered: u64 = 0;
        let mut last_seen = from;

        while let Some(result) = stream.next().await {
            let event = result?;
            last_seen = event.sequence;

            for (projection, checkpoint) in self.projections.iter().zip(checkpoints.iter_mut()) {
                if event.sequence > *checkpoint {
                    projection.handle(&event).await?;
                    *checkpoint = event.sequence;
                    delivered += 1;
                    metrics::counter!("projections_events_processed").increment(1);
                }
            }
        }

        if delivered > 0 {
            tracing::debug!(from, to = last_seen, delivered, "catch-up complete");
        }
        Ok(delivered)
    }

    /// Pushes one event to every projection regardless of position.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        for projection in &self.projections {
            projection.handle(event).await?;
        }
        Ok(())
    }

    /// Resets every projection and replays the whole journal.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<()> {
        for projection in &self.projections {
            projection.reset().await?;
            tracing::info!(projection = projection.name(), "projection reset");
        }
        self.run_catch_up().await.map(|_| ())
    }
}
