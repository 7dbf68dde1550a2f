//! Built-in coupon providers: percentage rebate, fixed rebate and free-item
//! injection. Rebates enter the basket as immutable lines with a negative
//! value and a positive rebate, so totals stay consistent without special
//! casing.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::debug;

use super::CouponProvider;
use crate::catalog::{CouponDefinition, ProductCatalog};
use crate::entities::basket::Basket;
use crate::entities::order_line::OrderLine;
use crate::entities::price::{lowest_price, Price};
use crate::errors::BasketError;

fn meets_minimum(definition: &CouponDefinition, basket: &Basket) -> bool {
    match definition.config.min_basket_value {
        Some(minimum) => basket.totals.subtotal >= minimum,
        None => true,
    }
}

fn rebate_line(definition: &CouponDefinition, code: &str, amount: Decimal, currency: &str) -> OrderLine {
    let mut price = Price::new(-amount, currency);
    price.rebate = amount;

    OrderLine::new(
        definition.id.clone(),
        format!("rebate-{code}"),
        definition.label.clone(),
        1,
        price,
    )
}

fn basket_currency(basket: &Basket, fallback: &str) -> String {
    if basket.totals.currency.is_empty() {
        fallback.to_string()
    } else {
        basket.totals.currency.clone()
    }
}

/// Grants a percentage of the basket subtotal as rebate.
pub struct PercentRebateProvider {
    pub fallback_currency: String,
}

#[async_trait]
impl CouponProvider for PercentRebateProvider {
    fn is_eligible(&self, definition: &CouponDefinition, basket: &Basket) -> bool {
        meets_minimum(definition, basket)
    }

    async fn apply(
        &self,
        definition: &CouponDefinition,
        code: &str,
        basket: &mut Basket,
    ) -> Result<(), BasketError> {
        let amount = basket.totals.subtotal * definition.config.discount / Decimal::from(100);
        let amount = amount.min(basket.totals.subtotal).max(Decimal::ZERO);
        let amount = amount.round_dp(2);

        debug!(%code, %amount, "granting percentage rebate");
        let currency = basket_currency(basket, &self.fallback_currency);
        let line = rebate_line(definition, code, amount, &currency);
        basket.add_coupon_lines(code, vec![line]);
        Ok(())
    }
}

/// Grants a fixed rebate amount, capped at the basket subtotal.
pub struct FixedRebateProvider {
    pub fallback_currency: String,
}

#[async_trait]
impl CouponProvider for FixedRebateProvider {
    fn is_eligible(&self, definition: &CouponDefinition, basket: &Basket) -> bool {
        meets_minimum(definition, basket)
    }

    async fn apply(
        &self,
        definition: &CouponDefinition,
        code: &str,
        basket: &mut Basket,
    ) -> Result<(), BasketError> {
        let amount = definition
            .config
            .discount
            .min(basket.totals.subtotal)
            .max(Decimal::ZERO);

        debug!(%code, %amount, "granting fixed rebate");
        let currency = basket_currency(basket, &self.fallback_currency);
        let line = rebate_line(definition, code, amount, &currency);
        basket.add_coupon_lines(code, vec![line]);
        Ok(())
    }
}

/// Injects the configured product as a free, immutable line. The product's
/// regular price is recorded as granted rebate.
pub struct FreeItemProvider {
    products: Arc<dyn ProductCatalog>,
}

impl FreeItemProvider {
    pub fn new(products: Arc<dyn ProductCatalog>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CouponProvider for FreeItemProvider {
    fn is_eligible(&self, definition: &CouponDefinition, basket: &Basket) -> bool {
        definition.config.free_product_id.is_some() && meets_minimum(definition, basket)
    }

    async fn apply(
        &self,
        definition: &CouponDefinition,
        code: &str,
        basket: &mut Basket,
    ) -> Result<(), BasketError> {
        let product_id = definition.config.free_product_id.as_deref().ok_or_else(|| {
            BasketError::CouponUnavailable(code.to_string())
        })?;

        let product = self
            .products
            .get_product(product_id)
            .await?
            .ok_or_else(|| BasketError::ProductUnavailable(product_id.to_string()))?;

        let regular = lowest_price(&product.price_tiers, 1)?;
        let mut price = Price::zero(regular.currency.clone());
        price.rebate = regular.value;
        price.tax_rate = regular.tax_rate;

        let mut line = OrderLine::new(
            product.id.clone(),
            product.code.clone(),
            product.name.clone(),
            1,
            price,
        );
        line.stock_type = "default".to_string();

        debug!(%code, product = %product.code, "injecting free item");
        basket.add_coupon_lines(code, vec![line]);
        Ok(())
    }
}
