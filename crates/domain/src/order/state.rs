//! Order status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of an order.
///
/// ```text
/// Pending ──► OrderReceived ──► OutForDelivery ──► Delivered
///    │              ▲                 │
///    │              └─── unassign ────┘
///    └──► Cancelled
/// ```
///
/// `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Placed, awaiting admin verification.
    #[default]
    Pending,

    /// Verified, waiting for a delivery agent.
    OrderReceived,

    /// Assigned to a delivery agent.
    OutForDelivery,

    Delivered,

    Cancelled,
}

impl OrderStatus {
    /// Customer self-cancellation is only possible before verification.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_issue_code(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_verify(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    pub fn can_assign(&self) -> bool {
        matches!(self, OrderStatus::OrderReceived)
    }

    pub fn can_deliver(&self) -> bool {
        matches!(self, OrderStatus::OrderReceived | OrderStatus::OutForDelivery)
    }

    pub fn can_hand_back(&self) -> bool {
        matches!(self, OrderStatus::OutForDelivery)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Human-readable label shown to customers and agents.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::OrderReceived => "Order Received",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
