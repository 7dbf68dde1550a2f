//! Shared fixture for the basket controller integration tests: in-memory
//! collaborators wired into a [`BasketContext`], plus seeding helpers.

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use storefront_basket::catalog::memory::{
    InMemoryCouponStore, InMemoryProductCatalog, InMemoryServiceCatalog,
};
use storefront_basket::catalog::{
    CouponCodeRecord, CouponConfig, CouponDefinition, ProductKind, ProductRecord,
    ServiceDefinition, VariantRecord,
};
use storefront_basket::config::AppConfig;
use storefront_basket::coupons::CouponProviderRegistry;
use storefront_basket::entities::attribute::AttributeRecord;
use storefront_basket::entities::basket::Basket;
use storefront_basket::entities::order_service::ServiceType;
use storefront_basket::entities::price::{Price, PriceTier};
use storefront_basket::errors::BasketError;
use storefront_basket::events::{Event, EventSender};
use storefront_basket::service_selection::ServiceProviderRegistry;
use storefront_basket::services::{BasketContext, BasketService};
use storefront_basket::session::{InMemorySessionStore, SessionStore};

pub struct TestApp {
    pub context: BasketContext,
    pub products: Arc<InMemoryProductCatalog>,
    pub coupons: Arc<InMemoryCouponStore>,
    pub services: Arc<InMemoryServiceCatalog>,
    pub session_store: Arc<InMemorySessionStore>,
    pub events: mpsc::Receiver<Event>,
}

fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

impl TestApp {
    pub fn new() -> Self {
        init_tracing();
        let products = Arc::new(InMemoryProductCatalog::new());
        let coupons = Arc::new(InMemoryCouponStore::new());
        let services = Arc::new(InMemoryServiceCatalog::new());
        let session_store = Arc::new(InMemorySessionStore::new());
        let config = AppConfig::default();
        let (event_sender, events) = EventSender::channel(config.event_channel_capacity);

        let coupon_providers = Arc::new(CouponProviderRegistry::with_defaults(
            products.clone(),
            config.default_currency.clone(),
        ));
        let service_providers = Arc::new(ServiceProviderRegistry::with_defaults(
            config.free_delivery_threshold,
        ));

        let context = BasketContext {
            session_store: session_store.clone(),
            products: products.clone(),
            coupons: coupons.clone(),
            services: services.clone(),
            coupon_providers,
            service_providers,
            event_sender: Arc::new(event_sender),
            config: Arc::new(config),
        };

        Self {
            context,
            products,
            coupons,
            services,
            session_store,
            events,
        }
    }

    pub async fn basket(&self, session_key: &str) -> BasketService {
        BasketService::load(self.context.clone(), session_key)
            .await
            .expect("loading the basket must succeed")
    }

    pub fn seed_product(&self, id: &str, code: &str, price: Decimal) {
        self.products.insert(ProductRecord {
            id: id.into(),
            code: code.into(),
            name: code.into(),
            kind: ProductKind::Single,
            price_tiers: vec![tier(1, price)],
            attributes: Vec::new(),
            variants: Vec::new(),
        });
    }

    pub fn seed_tiered_product(&self, id: &str, code: &str, tiers: &[(u32, Decimal)]) {
        self.products.insert(ProductRecord {
            id: id.into(),
            code: code.into(),
            name: code.into(),
            kind: ProductKind::Single,
            price_tiers: tiers.iter().map(|(q, v)| tier(*q, *v)).collect(),
            attributes: Vec::new(),
            variants: Vec::new(),
        });
    }

    pub fn seed_coupon(&self, code: &str, provider: &str, config: CouponConfig) {
        let coupon_id = format!("coupon-{code}");
        self.coupons.insert_code(CouponCodeRecord {
            code: code.into(),
            coupon_id: coupon_id.clone(),
            valid_from: None,
            valid_until: None,
            usage_budget: None,
            usage_count: 0,
        });
        self.coupons.insert_definition(CouponDefinition {
            id: coupon_id,
            label: format!("Coupon {code}"),
            provider: provider.into(),
            config,
        });
    }

    pub fn seed_service(
        &self,
        id: &str,
        code: &str,
        service_type: ServiceType,
        provider: &str,
        price: Price,
    ) {
        self.services.insert(ServiceDefinition {
            id: id.into(),
            code: code.into(),
            name: code.into(),
            service_type,
            provider: provider.into(),
            position: 0,
            price,
            config: Default::default(),
        });
    }
}

pub fn tier(quantity: u32, value: Decimal) -> PriceTier {
    PriceTier {
        quantity,
        price: Price::new(value, "EUR"),
    }
}

pub fn attribute_record(id: &str, code: &str, value: &str) -> AttributeRecord {
    AttributeRecord {
        id: id.into(),
        code: code.into(),
        name: code.into(),
        value: value.into(),
    }
}

pub fn selection_product(
    id: &str,
    code: &str,
    attributes: Vec<AttributeRecord>,
    variants: Vec<VariantRecord>,
    tiers: Vec<PriceTier>,
) -> ProductRecord {
    ProductRecord {
        id: id.into(),
        code: code.into(),
        name: code.into(),
        kind: ProductKind::Selection,
        price_tiers: tiers,
        attributes,
        variants,
    }
}

/// Session store whose writes always fail, for exercising that failed
/// persistence leaves the in-memory basket untouched.
pub struct BrokenSessionStore;

#[async_trait]
impl SessionStore for BrokenSessionStore {
    async fn load(&self, _key: &str) -> Result<Option<Basket>, BasketError> {
        Ok(None)
    }

    async fn store(&self, _key: &str, _basket: &Basket) -> Result<(), BasketError> {
        Err(BasketError::SessionStore("write refused".to_string()))
    }

    async fn remove(&self, _key: &str) -> Result<(), BasketError> {
        Err(BasketError::SessionStore("write refused".to_string()))
    }
}
