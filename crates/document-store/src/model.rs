//! Documents stored alongside the order journal.

use common::{Money, ProductId, Role, ShippingAddress, UserId};
use serde::{Deserialize, Serialize};

/// Catalog product with the counters the inventory ledger owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub sale_count: u32,
    pub image_url: Option<String>,
}

impl Product {
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            price,
            stock,
            sale_count: 0,
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }
}

/// Storefront account as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub address: Option<ShippingAddress>,
}

impl Account {
    pub fn new(name: impl Into<String>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            email: email.into(),
            role,
            address: None,
        }
    }

    pub fn with_address(mut self, address: ShippingAddress) -> Self {
        self.address = Some(address);
        self
    }

    /// The shipping address, if it is complete enough to deliver to.
    pub fn deliverable_address(&self) -> Option<&ShippingAddress> {
        self.address.as_ref().filter(|a| a.is_complete())
    }
}

/// One product line in a user's cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}
