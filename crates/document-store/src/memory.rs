use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{ProductId, UserId};
use tokio::sync::RwLock;

use crate::{
    Account, AccountDirectory, CartLine, CartStore, InventoryLedger, Product, Result, StockLine,
    StoreError,
};

#[derive(Debug, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    accounts: HashMap<UserId, Account>,
    carts: HashMap<UserId, Vec<CartLine>>,
}

/// In-memory document store for tests and the database-less binary.
///
/// One write lock guards all documents, which makes every ledger operation
/// (including multi-line reservations) a single atomic step.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryLedger for InMemoryDocumentStore {
    async fn product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product);
        Ok(())
    }

    async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<bool> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        if product.stock < quantity {
            metrics::counter!("inventory_reservation_failures_total").increment(1);
            return Ok(false);
        }
        product.stock -= quantity;
        product.sale_count += 1;
        Ok(true)
    }

    async fn reserve_all(&self, lines: &[StockLine]) -> Result<()> {
        let mut state = self.state.write().await;

        // Check the combined demand per product before touching anything.
        let mut demand: HashMap<ProductId, u32> = HashMap::new();
        for line in lines {
            let requested = demand.entry(line.product_id).or_default();
            *requested = requested.saturating_add(line.quantity);

            let product = state
                .products
                .get(&line.product_id)
                .ok_or(StoreError::ProductNotFound(line.product_id))?;
            if product.stock < *requested {
                metrics::counter!("inventory_reservation_failures_total").increment(1);
                return Err(StoreError::InsufficientStock {
                    product_id: line.product_id,
                    requested: *requested,
                    available: product.stock,
                });
            }
        }

        for line in lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock -= line.quantity;
                product.sale_count += 1;
            }
        }
        Ok(())
    }

    async fn release(&self, product_id: ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        product.stock = product.stock.saturating_add(quantity);
        product.sale_count = product.sale_count.saturating_sub(1);
        Ok(())
    }

    async fn release_all(&self, lines: &[StockLine]) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(missing) = lines
            .iter()
            .find(|line| !state.products.contains_key(&line.product_id))
        {
            return Err(StoreError::ProductNotFound(missing.product_id));
        }
        for line in lines {
            if let Some(product) = state.products.get_mut(&line.product_id) {
                product.stock = product.stock.saturating_add(line.quantity);
                product.sale_count = product.sale_count.saturating_sub(1);
            }
        }
        Ok(())
    }

    async fn set_stock(&self, product_id: ProductId, stock: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let product = state
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;
        tracing::warn!(%product_id, old = product.stock, new = stock, "stock overwritten outside the ledger");
        metrics::counter!("inventory_stock_overrides_total").increment(1);
        product.stock = stock;
        Ok(())
    }
}

#[async_trait]
impl CartStore for InMemoryDocumentStore {
    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        Ok(self
            .state
            .read()
            .await
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_line(&self, user_id: UserId, product_id: ProductId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        let lines = state.carts.entry(user_id).or_default();
        match lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity = quantity,
            None => lines.push(CartLine {
                product_id,
                quantity,
            }),
        }
        Ok(())
    }

    async fn remove_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(lines) = state.carts.get_mut(&user_id) else {
            return Ok(false);
        };
        let before = lines.len();
        lines.retain(|l| l.product_id != product_id);
        Ok(lines.len() != before)
    }

    async fn clear(&self, user_id: UserId) -> Result<()> {
        self.state.write().await.carts.remove(&user_id);
        Ok(())
    }

    async fn take_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        Ok(self
            .state
            .write()
            .await
            .carts
            .remove(&user_id)
            .unwrap_or_default())
    }

    async fn restore_cart(&self, user_id: UserId, lines: &[CartLine]) -> Result<()> {
        let mut state = self.state.write().await;
        let current = state.carts.remove(&user_id).unwrap_or_default();
        let mut restored: Vec<CartLine> = lines
            .iter()
            .filter(|line| !current.iter().any(|c| c.product_id == line.product_id))
            .copied()
            .collect();
        restored.extend(current);
        if !restored.is_empty() {
            state.carts.insert(user_id, restored);
        }
        Ok(())
    }
}

#[async_trait]
impl AccountDirectory for InMemoryDocumentStore {
    async fn account(&self, id: UserId) -> Result<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }

    async fn upsert_account(&self, account: Account) -> Result<()> {
        self.state
            .write()
            .await
            .accounts
            .insert(account.id, account);
        Ok(())
    }
}
