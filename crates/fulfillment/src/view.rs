//! Caller-facing views of orders and carts.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, ProductId, ShippingAddress, UserId};
use domain::{Order, OrderLine, OrderStatus, PaymentMethod};
use serde::Serialize;

/// Snapshot of one order as returned by every engine operation.
///
/// The verification code itself is never exposed, only its expiry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderView {
    pub id: AggregateId,
    pub customer_id: Option<UserId>,
    pub customer_email: String,
    pub lines: Vec<OrderLine>,
    pub total_amount: Money,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub status_label: &'static str,
    pub placed_at: Option<DateTime<Utc>>,
    pub cancellation_deadline: Option<DateTime<Utc>>,
    pub is_cancellable: bool,
    pub verification_code_expires_at: Option<DateTime<Utc>>,
    pub assigned_agent_id: Option<UserId>,
    pub assigned_agent_email: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
}

impl OrderView {
    /// `is_cancellable` is evaluated against `now`.
    pub fn from_order(id: AggregateId, order: &Order, now: DateTime<Utc>) -> Self {
        let status = order.status();
        Self {
            id,
            customer_id: order.customer_id(),
            customer_email: order.customer_email().to_string(),
            lines: order.lines().to_vec(),
            total_amount: order.total_amount(),
            shipping_address: order.shipping_address().clone(),
            payment_method: order.payment_method(),
            status,
            status_label: status.as_str(),
            placed_at: order.placed_at(),
            cancellation_deadline: order.cancellation_deadline(),
            is_cancellable: order.is_cancellable(now),
            verification_code_expires_at: order.verification_code().map(|c| c.expires_at),
            assigned_agent_id: order.assigned_agent(),
            assigned_agent_email: order.assignment().map(|a| a.agent_email.clone()),
            delivered_at: order.delivered_at(),
            cancelled_at: order.cancelled_at(),
            cancellation_reason: order.cancellation_reason().map(str::to_string),
        }
    }
}

/// Cart line priced at the current catalog price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLineView {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
    /// Units left right now; checkout re-validates.
    pub stock: u32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub subtotal: Money,
}

impl CartView {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
