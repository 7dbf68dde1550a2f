//! Collaborator contracts the basket layer consumes: product catalog, coupon
//! store and service catalog. Backend failures are reported as errors while
//! missing records are `None`, so callers can map them to distinct
//! user-facing kinds.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::attribute::AttributeRecord;
use crate::entities::order_service::ServiceType;
use crate::entities::price::{Price, PriceTier};
use crate::errors::BasketError;

pub mod memory;

/// Kind of a catalog product: a plain article or a selection product whose
/// variants resolve to specific sub-products.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    #[default]
    Single,
    Selection,
}

/// Sub-product of a selection product, identified by the set of
/// variant-building attribute ids.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub product_id: String,
    pub attribute_ids: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: String,
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub kind: ProductKind,
    pub price_tiers: Vec<PriceTier>,
    #[serde(default)]
    pub attributes: Vec<AttributeRecord>,
    #[serde(default)]
    pub variants: Vec<VariantRecord>,
}

/// Coupon code as entered by the customer, pointing at its parent coupon
/// definition and carrying validity window and usage budget.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponCodeRecord {
    pub code: String,
    pub coupon_id: String,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub usage_budget: Option<u32>,
    #[serde(default)]
    pub usage_count: u32,
}

impl CouponCodeRecord {
    /// A code is usable when `now` falls into its validity window and the
    /// usage budget is not exhausted.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        if self.valid_from.is_some_and(|from| now < from) {
            return false;
        }
        if self.valid_until.is_some_and(|until| now > until) {
            return false;
        }
        match self.usage_budget {
            Some(budget) => self.usage_count < budget,
            None => true,
        }
    }
}

/// Parent coupon definition: which provider implements the effect and with
/// what parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponDefinition {
    pub id: String,
    pub label: String,
    pub provider: String,
    #[serde(default)]
    pub config: CouponConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponConfig {
    /// Percentage or fixed amount depending on the provider.
    #[serde(default)]
    pub discount: Decimal,
    pub min_basket_value: Option<Decimal>,
    /// Product injected for free by free-item providers.
    pub free_product_id: Option<String>,
}

/// Delivery or payment option offered during checkout.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub code: String,
    pub name: String,
    pub service_type: ServiceType,
    pub provider: String,
    #[serde(default)]
    pub position: i32,
    pub price: Price,
    #[serde(default)]
    pub config: BTreeMap<String, String>,
}

#[async_trait]
pub trait ProductCatalog: Send + Sync {
    async fn get_product(&self, id: &str) -> Result<Option<ProductRecord>, BasketError>;

    async fn find_product_by_code(&self, code: &str)
        -> Result<Option<ProductRecord>, BasketError>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn find_code_record(&self, code: &str) -> Result<Option<CouponCodeRecord>, BasketError>;

    async fn find_coupon_definition(
        &self,
        id: &str,
    ) -> Result<Option<CouponDefinition>, BasketError>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get_service(&self, id: &str) -> Result<Option<ServiceDefinition>, BasketError>;

    async fn find_service_by_code(
        &self,
        code: &str,
    ) -> Result<Option<ServiceDefinition>, BasketError>;

    /// Services of the given type, ordered by position.
    async fn list_services(
        &self,
        service_type: ServiceType,
    ) -> Result<Vec<ServiceDefinition>, BasketError>;
}
