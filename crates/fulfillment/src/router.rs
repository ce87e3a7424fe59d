//! Delivery agent assignment.

use std::collections::BTreeSet;
use std::sync::Arc;

use common::{AggregateId, Clock, Role, UserId};
use document_store::DocumentStore;
use domain::{AssignAgent, HandBack, OrderService, ReleaseAssignment};
use event_store::{EventQuery, EventStore};
use serde::Serialize;

use crate::error::{FulfillmentError, Result};
use crate::messages;
use crate::notifier::{Notifier, deliver};
use crate::view::OrderView;

/// Result of [`AssignmentRouter::unassign_agent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UnassignOutcome {
    /// Orders moved back to `OrderReceived`.
    pub moved: usize,
    /// Orders that could not be released; each failure is logged.
    pub failed: usize,
}

/// Hands verified orders to delivery agents and takes them back.
pub struct AssignmentRouter<S: EventStore, D: DocumentStore> {
    orders: Arc<OrderService<S>>,
    documents: D,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl<S, D> AssignmentRouter<S, D>
where
    S: EventStore + 'static,
    D: DocumentStore,
{
    pub fn new(
        orders: Arc<OrderService<S>>,
        documents: D,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            orders,
            documents,
            notifier,
            clock,
        }
    }

    /// Puts an `OrderReceived` order out for delivery with `agent_id`.
    #[tracing::instrument(skip(self))]
    pub async fn assign(&self, order_id: AggregateId, agent_id: UserId) -> Result<OrderView> {
        let agent = self
            .documents
            .account(agent_id)
            .await?
            .filter(|a| a.role == Role::DeliveryAgent)
            .ok_or(FulfillmentError::AgentNotFound(agent_id))?;

        let assigned = self
            .orders
            .assign_agent(
                AssignAgent::new(order_id, agent_id, &agent.email),
                self.clock.now(),
            )
            .await
            .map_err(|e| FulfillmentError::from_domain(order_id, e))?;
        let order = assigned.aggregate;

        metrics::counter!("order_transitions_total", "to" => "out_for_delivery").increment(1);
        tracing::info!(%order_id, %agent_id, "order assigned");

        let notifier = self.notifier.as_ref();
        deliver(notifier, &agent.email, &messages::agent_assigned(order_id, &order)).await;
        deliver(
            notifier,
            order.customer_email(),
            &messages::out_for_delivery(order_id, &order),
        )
        .await;

        Ok(OrderView::from_order(order_id, &order, self.clock.now()))
    }

    /// Returns every non-terminal order held by `agent_id` to the queue.
    ///
    /// Candidates are found through the journal (every order the agent was
    /// ever assigned); each one is re-checked against its current state, so
    /// orders since handed to someone else or finished are skipped. A failure
    /// on one order does not stop the others.
    #[tracing::instrument(skip(self))]
    pub async fn unassign_agent(&self, agent_id: UserId) -> Result<UnassignOutcome> {
        let query = EventQuery::for_event_type("AgentAssigned")
            .aggregate_type("Order")
            .payload_contains(serde_json::json!({ "data": { "agent_id": agent_id } }));
        let candidates: BTreeSet<AggregateId> = self
            .orders
            .store()
            .query_events(query)
            .await
            .map_err(|e| FulfillmentError::Domain(e.into()))?
            .into_iter()
            .map(|e| e.aggregate_id)
            .collect();

        let mut outcome = UnassignOutcome::default();
        for order_id in candidates {
            match self
                .orders
                .release_assignment(ReleaseAssignment { order_id, agent_id }, self.clock.now())
                .await
            {
                Ok(released) if released.events.is_empty() => {}
                Ok(_) => {
                    outcome.moved += 1;
                    metrics::counter!("order_transitions_total", "to" => "order_received")
                        .increment(1);
                }
                Err(e) => {
                    outcome.failed += 1;
                    metrics::counter!("unassign_failures_total").increment(1);
                    tracing::warn!(%order_id, %agent_id, error = %e, "order not released from agent");
                }
            }
        }

        tracing::info!(%agent_id, moved = outcome.moved, failed = outcome.failed, "agent unassigned");
        Ok(outcome)
    }

    /// The assigned agent gives one `OutForDelivery` order back.
    #[tracing::instrument(skip(self))]
    pub async fn hand_back(&self, order_id: AggregateId, agent_id: UserId) -> Result<OrderView> {
        let released = self
            .orders
            .hand_back(HandBack { order_id, agent_id }, self.clock.now())
            .await
            .map_err(|e| FulfillmentError::from_domain(order_id, e))?;

        metrics::counter!("order_transitions_total", "to" => "order_received").increment(1);
        tracing::info!(%order_id, %agent_id, "order handed back");

        Ok(OrderView::from_order(
            order_id,
            &released.aggregate,
            self.clock.now(),
        ))
    }
}
