//! Delivery agent dashboard counts.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, UserId};
use domain::OrderEvent;
use event_store::EventEnvelope;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::{Projection, ProjectionPosition};
use crate::read_model::ReadModel;

/// What a delivery agent sees on their dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AgentDashboard {
    pub agent_id: Option<UserId>,
    /// Orders currently or finally held by the agent.
    pub total_assigned: usize,
    /// Out for delivery with this agent.
    pub active: usize,
    pub delivered: usize,
    pub active_orders: Vec<AggregateId>,
}

struct AgentWorkloadState {
    /// agent -> (order -> delivered?)
    agents: HashMap<UserId, BTreeMap<AggregateId, bool>>,
    position: ProjectionPosition,
}

/// Orders per delivery agent. An order leaves an agent's list when it is
/// handed back or the agent is unassigned; delivered orders stay.
#[derive(Clone)]
pub struct AgentWorkloadView {
    state: Arc<RwLock<AgentWorkloadState>>,
}

impl AgentWorkloadView {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(AgentWorkloadState {
                agents: HashMap::new(),
                position: ProjectionPosition::zero(),
            })),
        }
    }

    pub async fn dashboard(&self, agent_id: UserId) -> AgentDashboard {
        let state = self.state.read().await;
        let Some(orders) = state.agents.get(&agent_id) else {
            return AgentDashboard {
                agent_id: Some(agent_id),
                ..AgentDashboard::default()
            };
        };

        let active_orders: Vec<_> = orders
            .iter()
            .filter(|(_, delivered)| !**delivered)
            .map(|(id, _)| *id)
            .collect();
        AgentDashboard {
            agent_id: Some(agent_id),
            total_assigned: orders.len(),
            active: active_orders.len(),
            delivered: orders.len() - active_orders.len(),
            active_orders,
        }
    }
}

impl Default for AgentWorkloadView {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Projection for AgentWorkloadView {
    fn name(&self) -> &'static str {
        "AgentWorkloadView"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        let mut state = self.state.write().await;
        if event.aggregate_type == "Order" {
            let order_id = event.aggregate_id;
            match event.decode::<OrderEvent>()? {
                OrderEvent::AgentAssigned(data) => {
                    state
                        .agents
                        .entry(data.agent_id)
                        .or_default()
                        .insert(order_id, false);
                }
                OrderEvent::OrderUnassigned(data) => {
                    if let Some(orders) = state.agents.get_mut(&data.agent_id) {
                        orders.remove(&order_id);
                    }
                }
                OrderEvent::OrderDelivered(data) => {
                    if let Some(delivered) = state
                        .agents
                        .get_mut(&data.agent_id)
                        .and_then(|orders| orders.get_mut(&order_id))
                    {
                        *delivered = true;
                    }
                }
                _ => {}
            }
        }

        state.position = state.position.advance(event.sequence);
        Ok(())
    }

    async fn position(&self) -> ProjectionPosition {
        self.state.read().await.position
    }

    async fn reset(&self) -> Result<()> {
        let mut state = self.state.write().await;
        state.agents.clear();
        state.position = ProjectionPosition::zero();
        Ok(())
    }
}

impl ReadModel for AgentWorkloadView {
    fn name(&self) -> &'static str {
        "AgentWorkloadView"
    }

    fn count(&self) -> usize {
        self.state.try_read().map(|s| s.agents.len()).unwrap_or(0)
    }
}
