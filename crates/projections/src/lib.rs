//! Query side of the order journal.
//!
//! - [`Projection`]: folds journal events into a read model
//! - [`ReadModel`]: query access to the folded data
//! - [`ProjectionProcessor`]: feeds events from the store to projections
//! - Two views: customer order listing and delivery agent workload

pub mod error;
pub mod processor;
pub mod projection;
pub mod read_model;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use read_model::ReadModel;
pub use views::{AgentDashboard, AgentWorkloadView, CustomerOrdersView, OrderListing, OrderSummary};
