//! Mutable storefront documents the order engine coordinates with.
//!
//! - [`InventoryLedger`]: per-product stock and sale counters with atomic
//!   conditional reservation
//! - [`CartStore`]: the persistent per-user cart, sole input to checkout
//! - [`AccountDirectory`]: read access to customer and agent accounts
//!
//! Each contract has an in-memory and a PostgreSQL implementation.

pub mod accounts;
pub mod cart;
pub mod error;
pub mod inventory;
pub mod memory;
pub mod model;
pub mod postgres;

pub use accounts::AccountDirectory;
pub use cart::CartStore;
pub use error::{Result, StoreError};
pub use inventory::{InventoryLedger, StockLine};
pub use memory::InMemoryDocumentStore;
pub use model::{Account, CartLine, Product};
pub use postgres::PostgresDocumentStore;

/// Everything the order engine needs from the document side, in one bound.
pub trait DocumentStore:
    InventoryLedger + CartStore + AccountDirectory + Clone + Send + Sync + 'static
{
}

impl<T> DocumentStore for T where
    T: InventoryLedger + CartStore + AccountDirectory + Clone + Send + Sync + 'static
{
}
