//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod service;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use commands::*;
pub use events::{
    AgentAssignedData, OrderCancelledData, OrderDeliveredData, OrderEvent, OrderPlacedData,
    OrderUnassignedData, OrderVerifiedData, VerificationCodeIssuedData,
    VerificationCodeRevokedData,
};
pub use service::OrderService;
pub use state::OrderStatus;
pub use value_objects::{AgentAssignment, OrderLine, PaymentMethod};

use chrono::{DateTime, Utc};
use common::ProductId;
use thiserror::Error;

/// Reasons an order rejects a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("Order already placed")]
    AlreadyPlaced,

    #[error("Order does not exist")]
    NotPlaced,

    #[error("Order has no lines")]
    NoLines,

    #[error("Invalid quantity {quantity} for product {product_id} (must be at least 1)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// The caller does not own the order.
    #[error("Order belongs to another customer")]
    NotOwner,

    /// Not `Pending`, or the cancellation window has closed.
    #[error("Order can no longer be cancelled (status {status}, window closed at {deadline})")]
    NotCancellable {
        status: OrderStatus,
        deadline: DateTime<Utc>,
    },

    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    #[error("Invalid or expired verification code")]
    InvalidOrExpiredCode,

    /// The order is not assigned to the calling agent.
    #[error("Order is not assigned to this agent")]
    NotAssigned,
}
