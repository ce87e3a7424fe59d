//! Order aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{AggregateId, Money, ShippingAddress, UserId};
use event_store::Version;

use crate::aggregate::Aggregate;
use crate::otp::{OneTimeCode, OtpPurpose};

use super::{
    AgentAssignment, OrderError, OrderEvent, OrderLine, OrderStatus, PaymentMethod, PlaceOrder,
    events::OrderPlacedData,
};

/// Order aggregate root.
///
/// Everything captured by `OrderPlaced` (lines, prices, total, address,
/// deadline) is set once and never modified afterwards. Later events only
/// move the status and the assignment, code and delivery fields.
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,

    customer_id: Option<UserId>,
    customer_email: String,
    lines: Vec<OrderLine>,
    total_amount: Money,
    shipping_address: ShippingAddress,
    payment_method: PaymentMethod,
    placed_at: Option<DateTime<Utc>>,
    cancellation_deadline: Option<DateTime<Utc>>,

    status: OrderStatus,
    verification: Option<OneTimeCode>,
    assignment: Option<AgentAssignment>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::VerificationCodeIssued(data) => {
                self.verification = Some(data.code);
            }
            OrderEvent::VerificationCodeRevoked(_) => {
                self.verification = None;
            }
            OrderEvent::OrderVerified(_) => {
                self.status = OrderStatus::OrderReceived;
                self.verification = None;
            }
            OrderEvent::AgentAssigned(data) => {
                self.status = OrderStatus::OutForDelivery;
                self.assignment = Some(AgentAssignment {
                    agent_id: data.agent_id,
                    agent_email: data.agent_email,
                });
            }
            OrderEvent::OrderUnassigned(_) => {
                self.status = OrderStatus::OrderReceived;
                self.assignment = None;
            }
            OrderEvent::OrderDelivered(data) => {
                self.status = OrderStatus::Delivered;
                self.delivered_at = Some(data.delivered_at);
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.verification = None;
                self.delivered_at = None;
                self.cancelled_at = Some(data.cancelled_at);
                self.cancellation_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl Order {
    pub fn customer_id(&self) -> Option<UserId> {
        self.customer_id
    }

    pub fn customer_email(&self) -> &str {
        &self.customer_email
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        self.placed_at
    }

    pub fn cancellation_deadline(&self) -> Option<DateTime<Utc>> {
        self.cancellation_deadline
    }

    /// The outstanding verification code, if one was issued and not yet
    /// consumed or revoked.
    pub fn verification_code(&self) -> Option<&OneTimeCode> {
        self.verification.as_ref()
    }

    pub fn assignment(&self) -> Option<&AgentAssignment> {
        self.assignment.as_ref()
    }

    pub fn assigned_agent(&self) -> Option<UserId> {
        self.assignment.as_ref().map(|a| a.agent_id)
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn is_placed(&self) -> bool {
        self.id.is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the owner could still cancel at `now`. Evaluated lazily; no
    /// timer ever closes the window.
    pub fn is_cancellable(&self, now: DateTime<Utc>) -> bool {
        self.status.can_cancel() && self.cancellation_deadline.is_some_and(|d| now < d)
    }
}

// Command methods (return events)
impl Order {
    pub fn place(&self, cmd: &PlaceOrder, now: DateTime<Utc>) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if cmd.lines.is_empty() {
            return Err(OrderError::NoLines);
        }
        if let Some(line) = cmd.lines.iter().find(|l| l.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }

        let total_amount = cmd.lines.iter().map(OrderLine::line_total).sum();

        Ok(vec![OrderEvent::OrderPlaced(OrderPlacedData {
            order_id: cmd.order_id,
            customer_id: cmd.customer_id,
            customer_email: cmd.customer_email.clone(),
            lines: cmd.lines.clone(),
            total_amount,
            shipping_address: cmd.shipping_address.clone(),
            payment_method: PaymentMethod::CashOnDelivery,
            placed_at: now,
            cancellation_deadline: now + Duration::minutes(cmd.cancellation_window_minutes),
        })])
    }

    /// Owner-only, `Pending` only, strictly before the deadline.
    pub fn cancel(
        &self,
        requested_by: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.customer_id != Some(requested_by) {
            return Err(OrderError::NotOwner);
        }
        if !self.is_cancellable(now) {
            return Err(OrderError::NotCancellable {
                status: self.status,
                deadline: self.cancellation_deadline.unwrap_or(now),
            });
        }

        Ok(vec![OrderEvent::order_cancelled(reason, requested_by, now)])
    }

    /// Any `Pending` order, whoever owns it and whether or not the window is
    /// still open.
    pub fn admin_cancel(
        &self,
        admin_id: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.can_cancel() {
            return Err(self.invalid_transition("cancel"));
        }

        Ok(vec![OrderEvent::order_cancelled(reason, admin_id, now)])
    }

    /// Replaces any outstanding code with `code`.
    pub fn issue_verification_code(
        &self,
        code: OneTimeCode,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.can_issue_code() {
            return Err(self.invalid_transition("issue a verification code"));
        }

        Ok(vec![OrderEvent::verification_code_issued(code, now)])
    }

    /// No-op when there is no outstanding code.
    pub fn revoke_verification_code(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.verification.is_none() {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::verification_code_revoked(now)])
    }

    /// A wrong or expired code leaves the order and the stored code untouched.
    pub fn confirm_verification(
        &self,
        candidate: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.can_verify() {
            return Err(self.invalid_transition("verify"));
        }

        let valid = self
            .verification
            .as_ref()
            .is_some_and(|otp| otp.verify(OtpPurpose::OrderVerification, candidate, now));
        if !valid {
            return Err(OrderError::InvalidOrExpiredCode);
        }

        Ok(vec![OrderEvent::order_verified(now)])
    }

    pub fn assign_agent(
        &self,
        agent_id: UserId,
        agent_email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.can_assign() {
            return Err(self.invalid_transition("assign"));
        }

        Ok(vec![OrderEvent::agent_assigned(agent_id, agent_email, now)])
    }

    /// Compensating transition used when an agent is unassigned in bulk.
    /// Orders that are terminal or belong to another agent are left alone.
    pub fn release_assignment(
        &self,
        agent_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.is_terminal() || self.assigned_agent() != Some(agent_id) {
            return Ok(vec![]);
        }
        Ok(vec![OrderEvent::order_unassigned(agent_id, now)])
    }

    pub fn hand_back(
        &self,
        agent_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.assigned_agent() != Some(agent_id) {
            return Err(OrderError::NotAssigned);
        }
        if !self.status.can_hand_back() {
            return Err(self.invalid_transition("hand back"));
        }

        Ok(vec![OrderEvent::order_unassigned(agent_id, now)])
    }

    pub fn mark_delivered(
        &self,
        agent_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if self.assigned_agent() != Some(agent_id) {
            return Err(OrderError::NotAssigned);
        }
        if !self.status.can_deliver() {
            return Err(self.invalid_transition("deliver"));
        }

        Ok(vec![OrderEvent::order_delivered(agent_id, now)])
    }
}

// Event application helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.customer_id = Some(data.customer_id);
        self.customer_email = data.customer_email;
        self.lines = data.lines;
        self.total_amount = data.total_amount;
        self.shipping_address = data.shipping_address;
        self.payment_method = data.payment_method;
        self.placed_at = Some(data.placed_at);
        self.cancellation_deadline = Some(data.cancellation_deadline);
        self.status = OrderStatus::Pending;
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        Ok(())
    }

    fn invalid_transition(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_state: self.status,
            action,
        }
    }
}
