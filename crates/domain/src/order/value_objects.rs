//! Value objects for the order domain.

use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// One line of an order, frozen at placement time.
///
/// `unit_price` is the catalog price when the order was placed; later price
/// changes never reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,

    /// Product name at placement time.
    pub name: String,

    /// Price per unit at placement time.
    pub unit_price: Money,

    pub quantity: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl OrderLine {
    pub fn new(
        product_id: ProductId,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            name: name.into(),
            unit_price,
            quantity,
            image_url: None,
        }
    }

    pub fn with_image(mut self, url: Option<String>) -> Self {
        self.image_url = url;
        self
    }

    /// `unit_price × quantity`.
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// How the order is paid. Only cash on delivery is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::CashOnDelivery => "Cash on Delivery",
        }
    }
}

/// The delivery agent currently responsible for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAssignment {
    pub agent_id: UserId,
    pub agent_email: String,
}
