//! In-memory catalog implementations, used by tests and by embeddings that
//! load their assortment up front.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{
    CouponCodeRecord, CouponDefinition, CouponStore, ProductCatalog, ProductRecord,
    ServiceCatalog, ServiceDefinition,
};
use crate::entities::order_service::ServiceType;
use crate::errors::BasketError;

#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: DashMap<String, ProductRecord>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, product: ProductRecord) {
        self.products.insert(product.id.clone(), product);
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn get_product(&self, id: &str) -> Result<Option<ProductRecord>, BasketError> {
        Ok(self.products.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_product_by_code(
        &self,
        code: &str,
    ) -> Result<Option<ProductRecord>, BasketError> {
        Ok(self
            .products
            .iter()
            .find(|entry| entry.value().code == code)
            .map(|entry| entry.value().clone()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCouponStore {
    codes: DashMap<String, CouponCodeRecord>,
    definitions: DashMap<String, CouponDefinition>,
}

impl InMemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_code(&self, record: CouponCodeRecord) {
        self.codes.insert(record.code.clone(), record);
    }

    pub fn insert_definition(&self, definition: CouponDefinition) {
        self.definitions.insert(definition.id.clone(), definition);
    }
}

#[async_trait]
impl CouponStore for InMemoryCouponStore {
    async fn find_code_record(&self, code: &str) -> Result<Option<CouponCodeRecord>, BasketError> {
        Ok(self.codes.get(code).map(|entry| entry.value().clone()))
    }

    async fn find_coupon_definition(
        &self,
        id: &str,
    ) -> Result<Option<CouponDefinition>, BasketError> {
        Ok(self.definitions.get(id).map(|entry| entry.value().clone()))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryServiceCatalog {
    services: DashMap<String, ServiceDefinition>,
}

impl InMemoryServiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, definition: ServiceDefinition) {
        self.services.insert(definition.id.clone(), definition);
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryServiceCatalog {
    async fn get_service(&self, id: &str) -> Result<Option<ServiceDefinition>, BasketError> {
        Ok(self.services.get(id).map(|entry| entry.value().clone()))
    }

    async fn find_service_by_code(
        &self,
        code: &str,
    ) -> Result<Option<ServiceDefinition>, BasketError> {
        Ok(self
            .services
            .iter()
            .find(|entry| entry.value().code == code)
            .map(|entry| entry.value().clone()))
    }

    async fn list_services(
        &self,
        service_type: ServiceType,
    ) -> Result<Vec<ServiceDefinition>, BasketError> {
        let mut services: Vec<ServiceDefinition> = self
            .services
            .iter()
            .filter(|entry| entry.value().service_type == service_type)
            .map(|entry| entry.value().clone())
            .collect();
        services.sort_by_key(|definition| definition.position);
        Ok(services)
    }
}
