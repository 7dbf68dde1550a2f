use std::sync::Arc;

use tracing::{instrument, warn};

use crate::catalog::{ServiceCatalog, ServiceDefinition};
use crate::entities::order_service::ServiceType;
use crate::errors::BasketError;
use crate::service_selection::{ServiceProvider, ServiceProviderRegistry};

/// Lookup façade over the service catalog, used during checkout to
/// enumerate delivery/payment options and resolve their providers.
#[derive(Clone)]
pub struct ServiceLookupService {
    catalog: Arc<dyn ServiceCatalog>,
    providers: Arc<ServiceProviderRegistry>,
}

impl ServiceLookupService {
    pub fn new(catalog: Arc<dyn ServiceCatalog>, providers: Arc<ServiceProviderRegistry>) -> Self {
        Self { catalog, providers }
    }

    /// Returns the service definition for the given id.
    pub async fn get(&self, id: &str) -> Result<ServiceDefinition, BasketError> {
        self.catalog
            .get_service(id)
            .await?
            .ok_or_else(|| BasketError::ServiceUnavailable(id.to_string()))
    }

    /// Returns the service definition for the given code.
    pub async fn find(&self, code: &str) -> Result<ServiceDefinition, BasketError> {
        self.catalog
            .find_service_by_code(code)
            .await?
            .ok_or_else(|| BasketError::ServiceUnavailable(code.to_string()))
    }

    /// Services of the given type, ordered by position.
    pub async fn search(
        &self,
        service_type: ServiceType,
    ) -> Result<Vec<ServiceDefinition>, BasketError> {
        self.catalog.list_services(service_type).await
    }

    /// Resolves every service of the given type to its provider. Definitions
    /// whose provider is not registered are skipped with a warning instead
    /// of failing the whole listing.
    #[instrument(skip(self), fields(service_type = %service_type))]
    pub async fn providers(
        &self,
        service_type: ServiceType,
    ) -> Result<Vec<(ServiceDefinition, Arc<dyn ServiceProvider>)>, BasketError> {
        let definitions = self.catalog.list_services(service_type).await?;
        let mut resolved = Vec::with_capacity(definitions.len());

        for definition in definitions {
            match self.providers.resolve(&definition.provider) {
                Ok(provider) => resolved.push((definition, provider)),
                Err(_) => {
                    warn!(
                        service = %definition.code,
                        provider = %definition.provider,
                        "skipping service without registered provider"
                    );
                }
            }
        }

        Ok(resolved)
    }
}
