use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::attribute::OrderAttribute;
use super::price::Price;

/// One product entry in the basket.
///
/// The line id stays stable for the lifetime of the line and is used to track
/// coupon effects; the position inside the basket is not stable across
/// deletes. Immutable lines (e.g. injected by a coupon provider) cannot be
/// edited or removed through the public mutation API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: Uuid,
    pub product_id: String,
    pub product_code: String,
    pub name: String,
    pub quantity: u32,
    pub stock_type: String,
    pub price: Price,
    pub attributes: Vec<OrderAttribute>,
    pub immutable: bool,
    /// Selection product this line was resolved from, if any. Repricing
    /// falls back to the parent's price list when the article has none.
    #[serde(default)]
    pub parent_product_id: Option<String>,
}

impl OrderLine {
    pub fn new(
        product_id: impl Into<String>,
        product_code: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        price: Price,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id: product_id.into(),
            product_code: product_code.into(),
            name: name.into(),
            quantity,
            stock_type: "default".to_string(),
            price,
            attributes: Vec::new(),
            immutable: false,
            parent_product_id: None,
        }
    }

    /// Total of this line: unit value times quantity.
    pub fn line_total(&self) -> Decimal {
        self.price.value * Decimal::from(self.quantity)
    }

    /// Per-line surcharges times quantity.
    pub fn costs_total(&self) -> Decimal {
        self.price.costs * Decimal::from(self.quantity)
    }

    /// Rebate granted on this line times quantity.
    pub fn rebate_total(&self) -> Decimal {
        self.price.rebate * Decimal::from(self.quantity)
    }

    /// Removes every attribute whose code is contained in `codes`.
    pub fn remove_attributes(&mut self, codes: &[String]) {
        self.attributes
            .retain(|attribute| !codes.contains(&attribute.code));
    }

    pub fn attribute(&self, code: &str) -> Option<&OrderAttribute> {
        self.attributes.iter().find(|attribute| attribute.code == code)
    }
}
