//! Order service: one method per order command.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventStore;

use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{
    AdminCancelOrder, AssignAgent, CancelOrder, ConfirmVerification, HandBack, IssueVerificationCode,
    MarkDelivered, Order, PlaceOrder, ReleaseAssignment,
};

/// Attempts per transition when another writer commits to the same order
/// first.
pub const MAX_ATTEMPTS: usize = 3;

impl From<super::OrderError> for DomainError {
    fn from(e: super::OrderError) -> Self {
        DomainError::Order(e)
    }
}

/// Wraps the command handler for the order aggregate.
///
/// Every transition after placement is version-checked and re-validated
/// against freshly loaded state on conflict.
pub struct OrderService<S: EventStore> {
    handler: CommandHandler<S, Order>,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S) -> Self {
        Self {
            handler: CommandHandler::new(store),
        }
    }

    pub fn handler(&self) -> &CommandHandler<S, Order> {
        &self.handler
    }

    pub fn store(&self) -> &S {
        self.handler.store()
    }

    /// `None` when no order exists under `order_id`.
    pub async fn get_order(&self, order_id: AggregateId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, customer_id = %cmd.customer_id))]
    pub async fn place_order(
        &self,
        cmd: PlaceOrder,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute(cmd.order_id, |order| order.place(&cmd, now))
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(
        &self,
        cmd: CancelOrder,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, MAX_ATTEMPTS, |order| {
                order.cancel(cmd.requested_by, &cmd.reason, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn admin_cancel_order(
        &self,
        cmd: AdminCancelOrder,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, MAX_ATTEMPTS, |order| {
                order.admin_cancel(cmd.admin_id, &cmd.reason, now)
            })
            .await
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn issue_verification_code(
        &self,
        cmd: IssueVerificationCode,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, MAX_ATTEMPTS, |order| {
                order.issue_verification_code(cmd.code.clone(), now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke_verification_code(
        &self,
        order_id: AggregateId,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(order_id, MAX_ATTEMPTS, |order| {
                order.revoke_verification_code(now)
            })
            .await
    }

    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id))]
    pub async fn confirm_verification(
        &self,
        cmd: ConfirmVerification,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, MAX_ATTEMPTS, |order| {
                order.confirm_verification(&cmd.code, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn assign_agent(
        &self,
        cmd: AssignAgent,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, MAX_ATTEMPTS, |order| {
                order.assign_agent(cmd.agent_id, &cmd.agent_email, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn release_assignment(
        &self,
        cmd: ReleaseAssignment,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, MAX_ATTEMPTS, |order| {
                order.release_assignment(cmd.agent_id, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn hand_back(
        &self,
        cmd: HandBack,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, MAX_ATTEMPTS, |order| {
                order.hand_back(cmd.agent_id, now)
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn mark_delivered(
        &self,
        cmd: MarkDelivered,
        now: DateTime<Utc>,
    ) -> Result<CommandResult<Order>, DomainError> {
        self.handler
            .execute_with_retry(cmd.order_id, MAX_ATTEMPTS, |order| {
                order.mark_delivered(cmd.agent_id, now)
            })
            .await
    }
}
