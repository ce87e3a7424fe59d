//! Shared types for the storefront order engine.

pub mod clock;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use types::{AggregateId, Money, ProductId, Role, ShippingAddress, UnknownRole, UserId};
