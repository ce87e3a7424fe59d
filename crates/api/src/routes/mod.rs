//! HTTP handlers and the state they share.

pub mod agents;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;

use std::sync::Arc;

use common::AggregateId;
use document_store::DocumentStore;
use event_store::EventStore;
use fulfillment::{AssignmentRouter, CartService, OrderLifecycleEngine};
use projections::{AgentWorkloadView, CustomerOrdersView, ProjectionProcessor};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: EventStore, D: DocumentStore> {
    pub engine: OrderLifecycleEngine<S, D>,
    pub router: AssignmentRouter<S, D>,
    pub carts: CartService<D>,
    pub customer_orders: CustomerOrdersView,
    pub agent_workload: AgentWorkloadView,
    pub projection_processor: Arc<ProjectionProcessor<S>>,
}

impl<S, D> AppState<S, D>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    /// Brings the read models up to date with the journal.
    pub async fn refresh_views(&self) -> Result<(), ApiError> {
        self.projection_processor.run_catch_up().await?;
        Ok(())
    }
}

fn parse_id<T: std::str::FromStr>(what: &str, raw: &str) -> Result<T, ApiError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what} id: {e}")))
}

fn parse_order_id(raw: &str) -> Result<AggregateId, ApiError> {
    parse_id("order", raw)
}
