//! Domain layer of the order engine.
//!
//! - [`Aggregate`] / [`DomainEvent`]: event-sourced entities rebuilt by replay
//! - [`CommandHandler`]: load, decide, append with an expected version
//! - [`Order`]: the order state machine and its immutable placement snapshot
//! - [`otp`]: one-time codes gating sensitive transitions

pub mod aggregate;
pub mod command;
pub mod error;
pub mod order;
pub mod otp;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    ADMIN_CANCELLATION_PREFIX, AdminCancelOrder, AgentAssignment, AssignAgent, CancelOrder,
    ConfirmVerification, HandBack, IssueVerificationCode, MarkDelivered, Order, OrderError,
    OrderEvent, OrderLine, OrderService, OrderStatus, PaymentMethod, PlaceOrder,
    ReleaseAssignment,
};
pub use otp::{OneTimeCode, OtpError, OtpPurpose};
