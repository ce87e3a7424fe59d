//! Delivery agent endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{Role, UserId};
use document_store::DocumentStore;
use event_store::EventStore;
use projections::AgentDashboard;
use serde::Serialize;

use super::{AppState, parse_id};
use crate::caller::Caller;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct UnassignResponse {
    pub agent_id: UserId,
    pub moved: usize,
    pub failed: usize,
}

/// POST /agents/{id}/unassign: returns every open order of the agent to
/// the queue. Orders that could not be released are counted in `failed`.
#[tracing::instrument(skip(state))]
pub async fn unassign<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<UnassignResponse>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Admin)?;
    let agent_id: UserId = parse_id("agent", &id)?;
    let outcome = state.router.unassign_agent(agent_id).await?;
    Ok(Json(UnassignResponse {
        agent_id,
        moved: outcome.moved,
        failed: outcome.failed,
    }))
}

/// GET /agents/me/dashboard
pub async fn dashboard<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
) -> Result<Json<AgentDashboard>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::DeliveryAgent)?;
    state.refresh_views().await?;
    Ok(Json(state.agent_workload.dashboard(caller.user_id).await))
}
