//! Engine error types.

use chrono::{DateTime, Utc};
use common::{AggregateId, ProductId, UserId};
use document_store::StoreError;
use domain::{DomainError, OrderError, OrderStatus};
use thiserror::Error;

/// Errors returned by engine, router and cart operations.
#[derive(Debug, Error)]
pub enum FulfillmentError {
    /// Missing, or not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Cannot {action} an order in status {status}")]
    InvalidState {
        status: OrderStatus,
        action: &'static str,
    },

    /// Nothing was reserved.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Invalid or expired verification code")]
    InvalidOrExpiredCode,

    #[error("Order can no longer be cancelled (status {status}, window closed at {deadline})")]
    NotCancellable {
        status: OrderStatus,
        deadline: DateTime<Utc>,
    },

    #[error("Delivery agent not found: {0}")]
    AgentNotFound(UserId),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// The verification code could not be sent and was revoked.
    #[error("Notification to {0} could not be delivered")]
    NotificationFailed(String),

    /// Concurrent writers kept winning the race on this order.
    #[error("Order {0} was modified concurrently")]
    Conflict(AggregateId),

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Domain error: {0}")]
    Domain(DomainError),
}

impl FulfillmentError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        FulfillmentError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps an order command failure. Ownership and assignment mismatches
    /// become `NotFound` so other users' orders are not disclosed.
    pub fn from_domain(order_id: AggregateId, err: DomainError) -> Self {
        if err.is_conflict() {
            return FulfillmentError::Conflict(order_id);
        }
        match err {
            DomainError::Order(order_err) => match order_err {
                OrderError::NotPlaced | OrderError::NotOwner | OrderError::NotAssigned => {
                    FulfillmentError::not_found("order", order_id)
                }
                OrderError::NotCancellable { status, deadline } => {
                    FulfillmentError::NotCancellable { status, deadline }
                }
                OrderError::InvalidStateTransition {
                    current_state,
                    action,
                } => FulfillmentError::InvalidState {
                    status: current_state,
                    action,
                },
                OrderError::InvalidOrExpiredCode => FulfillmentError::InvalidOrExpiredCode,
                OrderError::AlreadyPlaced => FulfillmentError::Conflict(order_id),
                other @ (OrderError::NoLines | OrderError::InvalidQuantity { .. }) => {
                    FulfillmentError::Validation(other.to_string())
                }
            },
            other => FulfillmentError::Domain(other),
        }
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FulfillmentError::NotFound { .. } => "not_found",
            FulfillmentError::InvalidState { .. } => "invalid_state",
            FulfillmentError::InsufficientStock { .. } => "insufficient_stock",
            FulfillmentError::InvalidOrExpiredCode => "invalid_code",
            FulfillmentError::NotCancellable { .. } => "not_cancellable",
            FulfillmentError::AgentNotFound(_) => "agent_not_found",
            FulfillmentError::Validation(_) => "validation",
            FulfillmentError::NotificationFailed(_) => "notification_failed",
            FulfillmentError::Conflict(_) => "conflict",
            FulfillmentError::Store(_) => "store",
            FulfillmentError::Domain(_) => "domain",
        }
    }
}

impl From<StoreError> for FulfillmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ProductNotFound(id) => FulfillmentError::not_found("product", id),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => FulfillmentError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            other => FulfillmentError::Store(other),
        }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, FulfillmentError>;
