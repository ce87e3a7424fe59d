//! Cart operations.
//!
//! Quantities are checked against stock when the cart changes; checkout
//! checks them again when it reserves.

use std::collections::HashMap;

use common::{Money, ProductId, UserId};
use document_store::DocumentStore;

use crate::error::{FulfillmentError, Result};
use crate::view::{CartLineView, CartView};

pub struct CartService<D: DocumentStore> {
    documents: D,
}

impl<D: DocumentStore> CartService<D> {
    pub fn new(documents: D) -> Self {
        Self { documents }
    }

    /// Adds `quantity` units, merging with a line already in the cart.
    #[tracing::instrument(skip(self))]
    pub async fn add_to_cart(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        if quantity == 0 {
            return Err(FulfillmentError::Validation(
                "quantity must be at least 1".into(),
            ));
        }
        let product = self
            .documents
            .product(product_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("product", product_id))?;

        let existing = self
            .documents
            .cart(user_id)
            .await?
            .into_iter()
            .find(|l| l.product_id == product_id)
            .map_or(0, |l| l.quantity);
        let wanted = existing.saturating_add(quantity);
        if wanted > product.stock {
            return Err(FulfillmentError::InsufficientStock {
                product_id,
                requested: wanted,
                available: product.stock,
            });
        }

        self.documents.set_line(user_id, product_id, wanted).await?;
        self.view_cart(user_id).await
    }

    /// Overwrites the quantity; zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<CartView> {
        if quantity == 0 {
            return self.remove_from_cart(user_id, product_id).await;
        }
        let product = self
            .documents
            .product(product_id)
            .await?
            .ok_or_else(|| FulfillmentError::not_found("product", product_id))?;
        if quantity > product.stock {
            return Err(FulfillmentError::InsufficientStock {
                product_id,
                requested: quantity,
                available: product.stock,
            });
        }

        self.documents.set_line(user_id, product_id, quantity).await?;
        self.view_cart(user_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_from_cart(&self, user_id: UserId, product_id: ProductId) -> Result<CartView> {
        if !self.documents.remove_line(user_id, product_id).await? {
            return Err(FulfillmentError::not_found("cart item", product_id));
        }
        self.view_cart(user_id).await
    }

    /// Lines priced at today's catalog prices. Lines whose product no longer
    /// exists are left out.
    pub async fn view_cart(&self, user_id: UserId) -> Result<CartView> {
        let cart = self.documents.cart(user_id).await?;
        if cart.is_empty() {
            return Ok(CartView::default());
        }

        let ids: Vec<_> = cart.iter().map(|l| l.product_id).collect();
        let products: HashMap<_, _> = self
            .documents
            .products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let lines: Vec<CartLineView> = cart
            .iter()
            .filter_map(|line| {
                let product = products.get(&line.product_id)?;
                Some(CartLineView {
                    product_id: product.id,
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity: line.quantity,
                    line_total: product.price.times(line.quantity),
                    stock: product.stock,
                    image_url: product.image_url.clone(),
                })
            })
            .collect();
        let subtotal: Money = lines.iter().map(|l| l.line_total).sum();

        Ok(CartView { lines, subtotal })
    }
}
