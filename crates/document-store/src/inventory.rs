//! Inventory ledger contract.

use async_trait::async_trait;
use common::ProductId;

use crate::{Product, Result};

/// Quantity of one product to reserve or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

impl StockLine {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
        }
    }
}

/// Owns `stock` and `sale_count` for every product.
///
/// Every decrement is a single conditional write ("decrement if stock is at
/// least N"), never a read followed by a write, so concurrent checkouts cannot
/// oversell.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    async fn product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Products that exist among `ids`, in no particular order.
    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Creates or replaces a catalog entry.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    /// Takes `quantity` units and bumps `sale_count` by one, only if enough
    /// stock is left. Returns `false` (and changes nothing) otherwise.
    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<bool>;

    /// Reserves every line or none of them.
    ///
    /// Fails with `InsufficientStock` naming the first line that could not be
    /// satisfied, or `ProductNotFound`; in both cases no counter changed.
    async fn reserve_all(&self, lines: &[StockLine]) -> Result<()>;

    /// Puts `quantity` units back and lowers `sale_count` by one, never below
    /// zero. Unconditional.
    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()>;

    async fn release_all(&self, lines: &[StockLine]) -> Result<()> {
        for line in lines {
            self.release(line.product_id, line.quantity).await?;
        }
        Ok(())
    }

    /// Administrative overwrite of the stock counter, outside the reservation
    /// contract.
    async fn set_stock(&self, product_id: ProductId, stock: u32) -> Result<()>;
}
