//! Notification templates.

use std::fmt::Write;

use common::AggregateId;
use domain::Order;

/// Escapes text taken from customer or catalog data before it goes into an
/// HTML body.
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// One rendered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn order_placed(order_id: AggregateId, order: &Order) -> Message {
    let items: Vec<String> = order
        .lines()
        .iter()
        .map(|l| format!("{} x {} ({})", l.quantity, l.name, l.line_total()))
        .collect();
    let html_items = order.lines().iter().fold(String::new(), |mut out, l| {
        let _ = write!(
            out,
            "<li>{} x {} ({})</li>",
            l.quantity,
            escape_html(&l.name),
            l.line_total()
        );
        out
    });
    let deadline = order
        .cancellation_deadline()
        .map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_default();

    Message {
        subject: "Your Order Has Been Placed!".to_string(),
        text: format!(
            "Your order {order_id} has been placed.\nItems: {}\nTotal: {}\nPayment: {}\nYou can cancel until {deadline}.",
            items.join(", "),
            order.total_amount(),
            order.payment_method().as_str(),
        ),
        html: format!(
            "<p>Your order <strong>{order_id}</strong> has been placed.</p>\
             <ul>{html_items}</ul>\
             <p>Total: <strong>{}</strong> ({})</p>\
             <p>You can cancel until {deadline}.</p>",
            order.total_amount(),
            order.payment_method().as_str(),
        ),
    }
}

pub fn order_cancelled(order_id: AggregateId, order: &Order) -> Message {
    let reason = order.cancellation_reason().unwrap_or("Cancelled");
    Message {
        subject: "Your Order Has Been Cancelled".to_string(),
        text: format!("Your order {order_id} has been cancelled. Reason: {reason}."),
        html: format!(
            "<p>Your order <strong>{order_id}</strong> has been cancelled.</p>\
             <p>Reason: {}</p>",
            escape_html(reason)
        ),
    }
}

/// `reason` is the free text the admin gave, without the stored prefix.
pub fn order_cancelled_by_admin(order_id: AggregateId, reason: &str) -> Message {
    Message {
        subject: format!("Your Order ({order_id}) Has Been Cancelled"),
        text: format!("Order {order_id} cancelled by admin. Reason: {reason}"),
        html: format!(
            "<p>Your order ({order_id}) has been cancelled by administration.</p>\
             <p><strong>Reason:</strong> {}</p>\
             <p>Contact support for questions.</p>",
            escape_html(reason)
        ),
    }
}

pub fn verification_code(order_id: AggregateId, code: &str, ttl_minutes: i64) -> Message {
    Message {
        subject: "Admin Verification Request - Action Required".to_string(),
        text: format!(
            "An admin is attempting to verify your order ({order_id}).\n\
             Please provide them with the following code: {code}\n\
             It will expire in {ttl_minutes} minutes.\n\
             If you did not expect this verification, contact support."
        ),
        html: format!(
            "<p>An admin is attempting to verify your order ({order_id}).</p>\
             <p>Please provide the admin with the following code: <strong>{code}</strong></p>\
             <p>The code will expire in {ttl_minutes} minutes.</p>\
             <p><strong>Do not share this code if you did not expect this verification.</strong></p>"
        ),
    }
}

pub fn status_updated(order_id: AggregateId, order: &Order) -> Message {
    let status = order.status();
    Message {
        subject: format!("Order Status Updated: {status}"),
        text: format!("Your order {order_id} status: {status}."),
        html: format!(
            "<p>The status of your order ({order_id}) has been updated to: <strong>{status}</strong>.</p>\
             <p>You can view your order details in the 'My Orders' section.</p>"
        ),
    }
}

pub fn agent_assigned(order_id: AggregateId, order: &Order) -> Message {
    let address = order.shipping_address();
    let landmark = address.landmark.as_deref().unwrap_or("-");
    Message {
        subject: format!("New Order Assigned: {order_id}"),
        text: format!(
            "Order {order_id} has been assigned to you.\n\
             Deliver to: {}, {}, {} {} (landmark: {landmark})\n\
             Collect on delivery: {}",
            address.name,
            address.phone,
            address.city_village,
            address.pincode,
            order.total_amount(),
        ),
        html: format!(
            "<p>Order <strong>{order_id}</strong> has been assigned to you.</p>\
             <p>Deliver to: {}, {}, {} {} (landmark: {})</p>\
             <p>Collect on delivery: <strong>{}</strong></p>",
            escape_html(&address.name),
            escape_html(&address.phone),
            escape_html(&address.city_village),
            escape_html(&address.pincode),
            escape_html(landmark),
            order.total_amount(),
        ),
    }
}

pub fn out_for_delivery(order_id: AggregateId, order: &Order) -> Message {
    let agent = order
        .assignment()
        .map(|a| a.agent_email.as_str())
        .unwrap_or("our delivery partner");
    Message {
        subject: "Your Order is Out for Delivery!".to_string(),
        text: format!("Your order {order_id} is out for delivery with {agent}."),
        html: format!(
            "<p>Your order <strong>{order_id}</strong> is out for delivery.</p>\
             <p>Delivery agent: {}</p>",
            escape_html(agent)
        ),
    }
}

pub fn order_delivered(order_id: AggregateId, order: &Order) -> Message {
    Message {
        subject: "Your Order Has Been Delivered!".to_string(),
        text: format!(
            "Your order {order_id} has been delivered. Amount paid: {}.",
            order.total_amount()
        ),
        html: format!(
            "<p>Your order <strong>{order_id}</strong> has been delivered.</p>\
             <p>Amount paid: {}</p><p>Thank you for shopping with us!</p>",
            order.total_amount()
        ),
    }
}
