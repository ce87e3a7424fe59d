//! Order lifecycle engine.
//!
//! Orchestrates the document side (inventory ledger, carts, accounts) and the
//! order journal:
//!
//! 1. Checkout reserves every cart line at once, then commits the order
//! 2. Cancellation (customer or admin) commits first, then returns the stock
//! 3. Verification, assignment and delivery are version-checked transitions
//!
//! Notifications go out after the change is committed and never undo it.

pub mod cart;
pub mod engine;
pub mod error;
pub mod messages;
pub mod notifier;
pub mod router;
pub mod settings;
pub mod view;

pub use cart::CartService;
pub use engine::OrderLifecycleEngine;
pub use error::{FulfillmentError, Result};
pub use messages::Message;
pub use notifier::{LogNotifier, Notifier, RecordingNotifier, SentMessage};
pub use router::{AssignmentRouter, UnassignOutcome};
pub use settings::EngineSettings;
pub use view::{CartLineView, CartView, OrderView};
