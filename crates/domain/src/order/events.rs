//! Order domain events.

use chrono::{DateTime, Utc};
use common::{AggregateId, Money, ShippingAddress, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::otp::OneTimeCode;

use super::{OrderLine, PaymentMethod};

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Checkout committed. Carries the full immutable snapshot.
    OrderPlaced(OrderPlacedData),

    VerificationCodeIssued(VerificationCodeIssuedData),

    /// The pending code was withdrawn, e.g. because it could not be sent.
    VerificationCodeRevoked(VerificationCodeRevokedData),

    /// Admin confirmed the order with a valid code.
    OrderVerified(OrderVerifiedData),

    AgentAssigned(AgentAssignedData),

    /// Compensating transition back to `OrderReceived`.
    OrderUnassigned(OrderUnassignedData),

    OrderDelivered(OrderDeliveredData),

    OrderCancelled(OrderCancelledData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::VerificationCodeIssued(_) => "VerificationCodeIssued",
            OrderEvent::VerificationCodeRevoked(_) => "VerificationCodeRevoked",
            OrderEvent::OrderVerified(_) => "OrderVerified",
            OrderEvent::AgentAssigned(_) => "AgentAssigned",
            OrderEvent::OrderUnassigned(_) => "OrderUnassigned",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_id: AggregateId,
    pub customer_id: UserId,
    pub customer_email: String,
    pub lines: Vec<OrderLine>,

    /// Sum of the line totals.
    pub total_amount: Money,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub placed_at: DateTime<Utc>,

    /// End of the self-cancellation window. Exclusive.
    pub cancellation_deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCodeIssuedData {
    pub code: OneTimeCode,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCodeRevokedData {
    pub revoked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderVerifiedData {
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAssignedData {
    pub agent_id: UserId,
    pub agent_email: String,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUnassignedData {
    /// The agent the order was taken from.
    pub agent_id: UserId,
    pub unassigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDeliveredData {
    pub agent_id: UserId,
    pub delivered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: String,
    pub cancelled_by: UserId,
    pub cancelled_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    pub fn verification_code_issued(code: OneTimeCode, issued_at: DateTime<Utc>) -> Self {
        OrderEvent::VerificationCodeIssued(VerificationCodeIssuedData { code, issued_at })
    }

    pub fn verification_code_revoked(revoked_at: DateTime<Utc>) -> Self {
        OrderEvent::VerificationCodeRevoked(VerificationCodeRevokedData { revoked_at })
    }

    pub fn order_verified(verified_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderVerified(OrderVerifiedData { verified_at })
    }

    pub fn agent_assigned(
        agent_id: UserId,
        agent_email: impl Into<String>,
        assigned_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::AgentAssigned(AgentAssignedData {
            agent_id,
            agent_email: agent_email.into(),
            assigned_at,
        })
    }

    pub fn order_unassigned(agent_id: UserId, unassigned_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderUnassigned(OrderUnassignedData {
            agent_id,
            unassigned_at,
        })
    }

    pub fn order_delivered(agent_id: UserId, delivered_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderDelivered(OrderDeliveredData {
            agent_id,
            delivered_at,
        })
    }

    pub fn order_cancelled(
        reason: impl Into<String>,
        cancelled_by: UserId,
        cancelled_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason: reason.into(),
            cancelled_by,
            cancelled_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::otp::OtpPurpose;

    #[test]
    fn event_types_match_variant_names() {
        let now = Utc::now();
        let agent = UserId::new();

        assert_eq!(
            OrderEvent::verification_code_revoked(now).event_type(),
            "VerificationCodeRevoked"
        );
        assert_eq!(OrderEvent::order_verified(now).event_type(), "OrderVerified");
        assert_eq!(
            OrderEvent::agent_assigned(agent, "a@example.com", now).event_type(),
            "AgentAssigned"
        );
        assert_eq!(
            OrderEvent::order_unassigned(agent, now).event_type(),
            "OrderUnassigned"
        );
        assert_eq!(
            OrderEvent::order_delivered(agent, now).event_type(),
            "OrderDelivered"
        );
        assert_eq!(
            OrderEvent::order_cancelled("changed mind", UserId::new(), now).event_type(),
            "OrderCancelled"
        );
    }

    #[test]
    fn agent_assigned_payload_shape() {
        let agent = UserId::new();
        let event = OrderEvent::agent_assigned(agent, "ravi@example.com", Utc::now());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "AgentAssigned");
        assert_eq!(json["data"]["agent_id"], agent.to_string());
        assert_eq!(json["data"]["agent_email"], "ravi@example.com");
    }

    #[test]
    fn verification_code_round_trips() {
        let code = OneTimeCode::issue(OtpPurpose::OrderVerification, 6, 10, Utc::now()).unwrap();
        let event = OrderEvent::verification_code_issued(code.clone(), Utc::now());

        let json = serde_json::to_string(&event).unwrap();
        match serde_json::from_str::<OrderEvent>(&json).unwrap() {
            OrderEvent::VerificationCodeIssued(data) => assert_eq!(data.code, code),
            other => panic!("Expected VerificationCodeIssued, got {other:?}"),
        }
    }
}
