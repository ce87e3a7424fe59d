//! Order lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{Role, UserId};
use document_store::DocumentStore;
use event_store::EventStore;
use fulfillment::{FulfillmentError, OrderView};
use projections::OrderListing;
use serde::Deserialize;

use super::{AppState, parse_id, parse_order_id};
use crate::caller::Caller;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub code: String,
}

#[derive(Deserialize)]
pub struct AssignRequest {
    pub agent_id: String,
}

#[derive(Deserialize)]
pub struct AdminCancelRequest {
    pub reason: String,
}

/// POST /orders: checks out the caller's cart.
#[tracing::instrument(skip(state), fields(user_id = %caller.user_id))]
pub async fn place<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
) -> Result<(StatusCode, Json<OrderView>), ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Customer)?;
    let order = state.engine.place_order(caller.user_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/mine: newest first, with the cancellation flag as of now.
pub async fn mine<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
) -> Result<Json<Vec<OrderListing>>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Customer)?;
    state.refresh_views().await?;
    let orders = state
        .customer_orders
        .orders_for_customer(caller.user_id, state.engine.now())
        .await;
    Ok(Json(orders))
}

/// GET /orders/{id}: customers see their own orders, agents the orders
/// assigned to them, admins everything.
#[tracing::instrument(skip(state))]
pub async fn get<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    let order_id = parse_order_id(&id)?;
    let order = match caller.role {
        Role::Customer => {
            state
                .engine
                .get_order_for_customer(order_id, caller.user_id)
                .await?
        }
        Role::DeliveryAgent => {
            let order = state.engine.get_order(order_id).await?;
            if order.assigned_agent_id != Some(caller.user_id) {
                return Err(FulfillmentError::not_found("order", order_id).into());
            }
            order
        }
        Role::Admin => state.engine.get_order(order_id).await?,
    };
    Ok(Json(order))
}

/// POST /orders/{id}/cancel
#[tracing::instrument(skip(state), fields(user_id = %caller.user_id))]
pub async fn cancel<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Customer)?;
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.engine.cancel_order(order_id, caller.user_id).await?))
}

/// POST /orders/{id}/admin-cancel: cancels any `Pending` order, outside the
/// customer's window.
#[tracing::instrument(skip(state, req), fields(admin_id = %caller.user_id))]
pub async fn admin_cancel<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<AdminCancelRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Admin)?;
    let order_id = parse_order_id(&id)?;
    Ok(Json(
        state
            .engine
            .admin_cancel(order_id, caller.user_id, &req.reason)
            .await?,
    ))
}

/// POST /orders/{id}/verification-code
#[tracing::instrument(skip(state))]
pub async fn request_code<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Admin)?;
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.engine.request_verification_code(order_id).await?))
}

/// POST /orders/{id}/verify
#[tracing::instrument(skip(state, req))]
pub async fn verify<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<VerifyRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Admin)?;
    let order_id = parse_order_id(&id)?;
    let code = req.code.trim();
    Ok(Json(state.engine.confirm_verification(order_id, code).await?))
}

/// POST /orders/{id}/assign
#[tracing::instrument(skip(state, req))]
pub async fn assign<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<OrderView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Admin)?;
    let order_id = parse_order_id(&id)?;
    let agent_id: UserId = parse_id("agent", &req.agent_id)?;
    Ok(Json(state.router.assign(order_id, agent_id).await?))
}

/// POST /orders/{id}/hand-back
#[tracing::instrument(skip(state))]
pub async fn hand_back<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::DeliveryAgent)?;
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.router.hand_back(order_id, caller.user_id).await?))
}

/// POST /orders/{id}/deliver
#[tracing::instrument(skip(state))]
pub async fn deliver<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::DeliveryAgent)?;
    let order_id = parse_order_id(&id)?;
    Ok(Json(state.engine.mark_delivered(order_id, caller.user_id).await?))
}
