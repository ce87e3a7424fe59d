//! Cart store contract.

use async_trait::async_trait;
use common::{ProductId, UserId};

use crate::{CartLine, Result};

/// Persistent per-user carts.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Lines in the order they were first added.
    async fn cart(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Inserts the line or overwrites its quantity.
    async fn set_line(&self, user_id: UserId, product_id: ProductId, quantity: u32) -> Result<()>;

    /// Returns `false` when the product was not in the cart.
    async fn remove_line(&self, user_id: UserId, product_id: ProductId) -> Result<bool>;

    async fn clear(&self, user_id: UserId) -> Result<()>;

    /// Empties the cart and returns what it held, as one atomic step.
    ///
    /// Of two concurrent calls for the same user, only one sees the lines;
    /// the other gets an empty vector.
    async fn take_cart(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Puts taken lines back. Lines the user added in the meantime win.
    async fn restore_cart(&self, user_id: UserId, lines: &[CartLine]) -> Result<()>;
}
