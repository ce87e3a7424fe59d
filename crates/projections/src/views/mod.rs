//! Read model views.

pub mod agent_workload;
pub mod customer_orders;

pub use agent_workload::{AgentDashboard, AgentWorkloadView};
pub use customer_orders::{CustomerOrdersView, OrderListing, OrderSummary};
