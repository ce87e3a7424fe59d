//! Order commands.

use common::{AggregateId, ShippingAddress, UserId};

use crate::command::Command;
use crate::otp::OneTimeCode;

use super::{Order, OrderLine};

pub const DEFAULT_CANCELLATION_WINDOW_MINUTES: i64 = 60;

pub const CUSTOMER_CANCELLATION_REASON: &str = "Cancelled by customer";

pub const ADMIN_CANCELLATION_PREFIX: &str = "Admin Cancelled: ";

/// Commits a checkout as a new order.
#[derive(Debug, Clone)]
pub struct PlaceOrder {
    pub order_id: AggregateId,
    pub customer_id: UserId,
    pub customer_email: String,
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub cancellation_window_minutes: i64,
}

impl PlaceOrder {
    /// A new order with a generated id and the default cancellation window.
    pub fn new(
        customer_id: UserId,
        customer_email: impl Into<String>,
        lines: Vec<OrderLine>,
        shipping_address: ShippingAddress,
    ) -> Self {
        Self {
            order_id: AggregateId::new(),
            customer_id,
            customer_email: customer_email.into(),
            lines,
            shipping_address,
            cancellation_window_minutes: DEFAULT_CANCELLATION_WINDOW_MINUTES,
        }
    }

    pub fn with_cancellation_window(mut self, minutes: i64) -> Self {
        self.cancellation_window_minutes = minutes;
        self
    }
}

impl Command for PlaceOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Customer self-cancellation.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: AggregateId,
    pub requested_by: UserId,
    pub reason: String,
}

impl CancelOrder {
    pub fn by_customer(order_id: AggregateId, customer_id: UserId) -> Self {
        Self {
            order_id,
            requested_by: customer_id,
            reason: CUSTOMER_CANCELLATION_REASON.to_string(),
        }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Administrative cancellation of a pending order, ignoring the customer's
/// window.
#[derive(Debug, Clone)]
pub struct AdminCancelOrder {
    pub order_id: AggregateId,
    pub admin_id: UserId,
    /// Stored reason, already carrying [`ADMIN_CANCELLATION_PREFIX`].
    pub reason: String,
}

impl AdminCancelOrder {
    pub fn new(order_id: AggregateId, admin_id: UserId, reason: &str) -> Self {
        Self {
            order_id,
            admin_id,
            reason: format!("{ADMIN_CANCELLATION_PREFIX}{}", reason.trim()),
        }
    }
}

impl Command for AdminCancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Stores a freshly generated verification code on a pending order.
#[derive(Debug, Clone)]
pub struct IssueVerificationCode {
    pub order_id: AggregateId,
    pub code: OneTimeCode,
}

impl Command for IssueVerificationCode {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Admin confirmation with the code the customer received.
#[derive(Debug, Clone)]
pub struct ConfirmVerification {
    pub order_id: AggregateId,
    pub code: String,
}

impl ConfirmVerification {
    pub fn new(order_id: AggregateId, code: impl Into<String>) -> Self {
        Self {
            order_id,
            code: code.into(),
        }
    }
}

impl Command for ConfirmVerification {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[derive(Debug, Clone)]
pub struct AssignAgent {
    pub order_id: AggregateId,
    pub agent_id: UserId,
    pub agent_email: String,
}

impl AssignAgent {
    pub fn new(order_id: AggregateId, agent_id: UserId, agent_email: impl Into<String>) -> Self {
        Self {
            order_id,
            agent_id,
            agent_email: agent_email.into(),
        }
    }
}

impl Command for AssignAgent {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// Bulk unassignment of one order: a no-op unless the order is still active
/// and assigned to `agent_id`.
#[derive(Debug, Clone)]
pub struct ReleaseAssignment {
    pub order_id: AggregateId,
    pub agent_id: UserId,
}

impl Command for ReleaseAssignment {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

/// An agent returns one out-for-delivery order to the queue.
#[derive(Debug, Clone)]
pub struct HandBack {
    pub order_id: AggregateId,
    pub agent_id: UserId,
}

impl Command for HandBack {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}

#[derive(Debug, Clone)]
pub struct MarkDelivered {
    pub order_id: AggregateId,
    pub agent_id: UserId,
}

impl Command for MarkDelivered {
    type Aggregate = Order;

    fn aggregate_id(&self) -> AggregateId {
        self.order_id
    }
}
