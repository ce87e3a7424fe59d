//! Cart endpoints. Customers only.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::{ProductId, Role};
use document_store::DocumentStore;
use event_store::EventStore;
use fulfillment::CartView;
use serde::Deserialize;

use super::{AppState, parse_id};
use crate::caller::Caller;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: u32,
}

/// GET /cart
pub async fn view<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
) -> Result<Json<CartView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Customer)?;
    Ok(Json(state.carts.view_cart(caller.user_id).await?))
}

/// POST /cart/items
#[tracing::instrument(skip(state, req), fields(user_id = %caller.user_id))]
pub async fn add_item<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Customer)?;
    let product_id: ProductId = parse_id("product", &req.product_id)?;
    let cart = state
        .carts
        .add_to_cart(caller.user_id, product_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// PUT /cart/items/{product_id}
#[tracing::instrument(skip(state, req), fields(user_id = %caller.user_id))]
pub async fn update_item<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(product_id): Path<String>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<CartView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Customer)?;
    let product_id: ProductId = parse_id("product", &product_id)?;
    let cart = state
        .carts
        .update_quantity(caller.user_id, product_id, req.quantity)
        .await?;
    Ok(Json(cart))
}

/// DELETE /cart/items/{product_id}
#[tracing::instrument(skip(state), fields(user_id = %caller.user_id))]
pub async fn remove_item<S, D>(
    State(state): State<Arc<AppState<S, D>>>,
    caller: Caller,
    Path(product_id): Path<String>,
) -> Result<Json<CartView>, ApiError>
where
    S: EventStore + Clone + 'static,
    D: DocumentStore,
{
    caller.require(Role::Customer)?;
    let product_id: ProductId = parse_id("product", &product_id)?;
    Ok(Json(
        state.carts.remove_from_cart(caller.user_id, product_id).await?,
    ))
}
