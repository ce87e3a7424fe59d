//! Customer order listing, newest first.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, Money, UserId};
use domain::{OrderEvent, OrderStatus};
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// One row of a customer's "My Orders" page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderSummary {
    pub order_id: AggregateId,
    pub customer_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub item_count: u32,
    pub placed_at: DateTime<Utc>,
    pub cancellation_deadline: DateTime<Utc>,
    pub assigned_agent_email: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OrderSummary {
    /// Evaluated against `now` on every read; nothing closes the window
    /// eagerly.
    pub fn is_cancellable(&self, now: DateTime<Utc>) -> bool {
        self.status.can_cancel() && now < self.cancellation_deadline
    }
}

/// An [`OrderSummary`] with the cancellation flag resolved for one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderListing {
    #[serde(flatten)]
    pub summary: OrderSummary,
    pub status_label: &'static str,
    pub is_cancellable: bool,
}

struct CustomerOrdersState {
    orders: HashMap<AggregateId, OrderSummary>,
    by_customer: HashMap<UserId, Vec<AggregateId>>,
    position: ProjectionPosition,
}

/// Orders per customer, built from the order journal.
#[derive(Clone)]
pub struct CustomerOrdersView {
    state: Arc<RwLock<CustomerOrdersState>>,
}

impl CustomerOrdersView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(CustomerOrdersState {
                orders: HashMap::new(),
                by_customer: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Option<OrderSummary> {
        self.state.read().await.orders.get(&order_id).cloned()
    }

    /// The customer's orders, most recently placed first.
    pub async fn orders_for_customer(
        &self,
        customer_id: UserId,
        now: DateTime<Utc>,
    ) -> Vec<OrderListing> {
        let state = self.state.read().await;
        let mut summaries: Vec<&OrderSummary> = state
            .by_customer
            .get(&customer_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.orders.get(id))
            .collect();
        summaries.sort_by(|a, b| b.placed_at.cmp(&a.placed_at));

        summaries
            .into_iter()
            .map(|s| OrderListing {
                summary: s.clone(),
                status_label: s.status.as_str(),
                is_cancellable: s.is_cancellable(now),
            })
            .collect()
    }
}

impl Default for CustomerOrdersView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for CustomerOrdersView {
    fn name(&self) -> &'static str {
        "CustomerOrdersView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        if event.aggregate_type != "Order" {
            state.position = state.position.advance(event.sequence);
            return Ok(());
        }

        let order_event: OrderEvent = event.decode()?;
        let order_id = event.aggregate_id;

        match order_event {
            OrderEvent::OrderPlaced(data) => {
                let summary = OrderSummary {
                    order_id,
                    customer_id: data.customer_id,
                    status: OrderStatus::Pending,
                    total_amount: data.total_amount,
                    item_count: data.lines.iter().map(|l| l.quantity).sum(),
                    placed_at: data.placed_at,
                    cancellation_deadline: data.cancellation_deadline,
                    assigned_agent_email: None,
                    delivered_at: None,
                };
                state.orders.insert(order_id, summary);
                state
                    .by_customer
                    .entry(data.customer_id)
                    .or_default()
                    .push(order_id);
            }
            OrderEvent::OrderVerified(_) => {
                if let Some(summary) = state.orders.get_mut(&order_id) {
                    summary.status = OrderStatus::OrderReceived;
                }
            }
            OrderEvent::AgentAssigned(data) => {
                if let Some(summary) = state.orders.get_mut(&order_id) {
                    summary.status = OrderStatus::OutForDelivery;
                    summary.assigned_agent_email = Some(data.agent_email);
                }
            }
            OrderEvent::OrderUnassigned(_) => {
                if let Some(summary) = state.orders.get_mut(&order_id) {
                    summary.status = OrderStatus::OrderReceived;
                    summary.assigned_agent_email = None;
                }
            }
            OrderEvent::OrderDelivered(data) => {
                if let Some(summary) = state.orders.get_mut(&order_id) {
                    summary.status = OrderStatus::Delivered;
                    summary.delivered_at = Some(data.delivered_at);
                }
            }
            OrderEvent::OrderCancelled(_) => {
                if let Some(summary) = state.orders.get_mut(&order_id) {
                    summary.status = OrderStatus::Cancelled;
                    summary.delivered_at = None;
                }
            }
            // Codes are not part of the listing
            OrderEvent::VerificationCodeIssued(_) | OrderEvent::VerificationCodeRevoked(_) => {}
        }

        state.position = state.position.advance(event.sequence);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.orders.clear();
        state.by_customer.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for CustomerOrdersView {
    fn name(&self) -> &'static str {
        "CustomerOrdersView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.orders.len()).unwrap_or(0)
    }
}
