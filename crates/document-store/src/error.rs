use common::ProductId;
use thiserror::Error;

/// Errors raised by the document stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A reservation could not be satisfied. Nothing was decremented.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// A stored row could not be mapped back to a document.
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
