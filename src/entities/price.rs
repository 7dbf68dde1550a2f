use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::BasketError;

/// Immutable monetary value attached to order lines and order services.
///
/// `value` is the unit amount, `costs` covers per-unit surcharges (shipping,
/// payment fees), `rebate` is the discount already contained in `value`.
/// Catalog-level rebates are zeroed when a price is copied into the basket;
/// basket-level rebates are granted through coupon lines instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub value: Decimal,
    pub costs: Decimal,
    pub rebate: Decimal,
    pub tax_rate: Decimal,
    pub currency: String,
}

impl Price {
    pub fn new(value: Decimal, currency: impl Into<String>) -> Self {
        Self {
            value,
            costs: Decimal::ZERO,
            rebate: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            currency: currency.into(),
        }
    }

    pub fn zero(currency: impl Into<String>) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// Drops the catalog rebate in favor of rebates granted for the order.
    pub fn clear_rebate(&mut self) {
        self.rebate = Decimal::ZERO;
    }
}

/// One entry of a tiered price list: `quantity` is the minimum amount the
/// tier applies from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub quantity: u32,
    pub price: Price,
}

/// Picks the applicable tiered price for the requested quantity: among all
/// tiers whose minimum quantity is reached, the one with the lowest unit
/// value wins.
pub fn lowest_price(tiers: &[PriceTier], quantity: u32) -> Result<Price, BasketError> {
    tiers
        .iter()
        .filter(|tier| tier.quantity <= quantity)
        .min_by_key(|tier| tier.price.value)
        .map(|tier| tier.price.clone())
        .ok_or_else(|| {
            BasketError::ProductUnavailable(format!("no price available for quantity {quantity}"))
        })
}
