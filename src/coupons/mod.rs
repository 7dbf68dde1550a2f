//! Coupon engine: pluggable providers implement the monetary or line-item
//! effect of a coupon, resolved from a registry by the provider name stored
//! on the coupon definition.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::catalog::CouponDefinition;
use crate::entities::basket::Basket;
use crate::errors::BasketError;

pub mod providers;

/// Strategy implementing a coupon's business logic.
///
/// `apply` mutates the basket (injecting rebate or free-item lines registered
/// under the coupon code) and `remove` reverses the effect. Injected lines
/// are forced immutable by the basket, so customers can't edit them away.
#[async_trait]
pub trait CouponProvider: Send + Sync {
    /// Whether the basket meets the coupon's requirements.
    fn is_eligible(&self, definition: &CouponDefinition, basket: &Basket) -> bool;

    async fn apply(
        &self,
        definition: &CouponDefinition,
        code: &str,
        basket: &mut Basket,
    ) -> Result<(), BasketError>;

    /// Reverses the coupon's effect. The default drops the entry and every
    /// line recorded under the code.
    fn remove(&self, code: &str, basket: &mut Basket) {
        basket.remove_coupon(code);
    }
}

impl std::fmt::Debug for dyn CouponProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CouponProvider")
    }
}

/// Registry of coupon providers keyed by provider-type string.
#[derive(Default)]
pub struct CouponProviderRegistry {
    providers: DashMap<String, Arc<dyn CouponProvider>>,
}

impl CouponProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in providers. Rebate lines granted
    /// on an empty basket are denominated in `default_currency`.
    pub fn with_defaults(
        products: Arc<dyn crate::catalog::ProductCatalog>,
        default_currency: impl Into<String>,
    ) -> Self {
        let default_currency = default_currency.into();
        let registry = Self::new();
        registry.register(
            "percent-rebate",
            Arc::new(providers::PercentRebateProvider {
                fallback_currency: default_currency.clone(),
            }),
        );
        registry.register(
            "fixed-rebate",
            Arc::new(providers::FixedRebateProvider {
                fallback_currency: default_currency,
            }),
        );
        registry.register(
            "free-item",
            Arc::new(providers::FreeItemProvider::new(products)),
        );
        registry
    }

    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn CouponProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn CouponProvider>, BasketError> {
        self.providers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BasketError::UnknownProvider(name.to_string()))
    }
}
