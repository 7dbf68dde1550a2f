//! Service selection engine: pluggable providers implement delivery/payment
//! specific behavior (configuration schema, price contribution, persisted
//! configuration), resolved from a registry by the provider name stored on
//! the service definition.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::catalog::ServiceDefinition;
use crate::entities::basket::Basket;
use crate::entities::order_service::OrderService;
use crate::entities::price::Price;
use crate::errors::BasketError;

/// Strategy implementing the business logic of a delivery or payment option.
///
/// `validate_config` declares which attribute keys the provider recognizes:
/// the result contains one entry per declared key, `None` for a valid value
/// and `Some(message)` for a rejected one. The controller diffs the
/// customer's keys against the declared ones and reports the rest as
/// unknown.
pub trait ServiceProvider: Send + Sync {
    fn validate_config(
        &self,
        attributes: &BTreeMap<String, String>,
    ) -> BTreeMap<String, Option<String>>;

    /// Price contribution of this service for the given basket.
    fn calc_price(&self, definition: &ServiceDefinition, basket: &Basket) -> Price;

    /// Persists the chosen configuration onto the order service record.
    fn persist_config(
        &self,
        order_service: &mut OrderService,
        attributes: &BTreeMap<String, String>,
    );
}

/// Registry of service providers keyed by provider-type string.
#[derive(Default)]
pub struct ServiceProviderRegistry {
    providers: DashMap<String, Arc<dyn ServiceProvider>>,
}

impl ServiceProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in providers.
    pub fn with_defaults(free_delivery_threshold: Option<Decimal>) -> Self {
        let registry = Self::new();
        registry.register(
            "delivery-flat",
            Arc::new(FlatRateDeliveryProvider {
                free_above: free_delivery_threshold,
            }),
        );
        registry.register("payment-directdebit", Arc::new(DirectDebitPaymentProvider));
        registry
    }

    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn ServiceProvider>) {
        self.providers.insert(name.into(), provider);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ServiceProvider>, BasketError> {
        self.providers
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BasketError::UnknownProvider(name.to_string()))
    }
}

fn persist_recognized(
    order_service: &mut OrderService,
    attributes: &BTreeMap<String, String>,
    recognized: &[&str],
) {
    for key in recognized {
        if let Some(value) = attributes.get(*key) {
            order_service
                .attributes
                .insert((*key).to_string(), value.clone());
        }
    }
}

/// Flat-rate delivery, free from a configurable basket value.
pub struct FlatRateDeliveryProvider {
    pub free_above: Option<Decimal>,
}

const DELIVERY_KEYS: &[&str] = &["delivery.instructions", "delivery.dropoff"];
const DROPOFF_CHOICES: &[&str] = &["door", "neighbor", "depot"];

impl ServiceProvider for FlatRateDeliveryProvider {
    fn validate_config(
        &self,
        attributes: &BTreeMap<String, String>,
    ) -> BTreeMap<String, Option<String>> {
        let mut result = BTreeMap::new();
        result.insert("delivery.instructions".to_string(), None);

        let dropoff = match attributes.get("delivery.dropoff") {
            Some(value) if !DROPOFF_CHOICES.contains(&value.as_str()) => Some(format!(
                "dropoff must be one of: {}",
                DROPOFF_CHOICES.join(", ")
            )),
            _ => None,
        };
        result.insert("delivery.dropoff".to_string(), dropoff);
        result
    }

    fn calc_price(&self, definition: &ServiceDefinition, basket: &Basket) -> Price {
        let free = self
            .free_above
            .is_some_and(|threshold| basket.totals.subtotal >= threshold);

        let mut price = definition.price.clone();
        if free {
            price.value = Decimal::ZERO;
            price.costs = Decimal::ZERO;
        }
        price
    }

    fn persist_config(
        &self,
        order_service: &mut OrderService,
        attributes: &BTreeMap<String, String>,
    ) {
        persist_recognized(order_service, attributes, DELIVERY_KEYS);
    }
}

/// Direct debit payment with mandatory account data.
pub struct DirectDebitPaymentProvider;

const PAYMENT_KEYS: &[&str] = &["payment.account-owner", "payment.iban"];

static IBAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{2}[0-9]{2}[0-9A-Z]{8,30}$").expect("valid regex"));

impl ServiceProvider for DirectDebitPaymentProvider {
    fn validate_config(
        &self,
        attributes: &BTreeMap<String, String>,
    ) -> BTreeMap<String, Option<String>> {
        let mut result = BTreeMap::new();

        let owner = match attributes.get("payment.account-owner") {
            Some(value) if !value.trim().is_empty() => None,
            _ => Some("account owner is required".to_string()),
        };
        result.insert("payment.account-owner".to_string(), owner);

        let iban = match attributes.get("payment.iban") {
            Some(value) if IBAN_RE.is_match(value) => None,
            Some(_) => Some("not a valid IBAN".to_string()),
            None => Some("IBAN is required".to_string()),
        };
        result.insert("payment.iban".to_string(), iban);
        result
    }

    fn calc_price(&self, definition: &ServiceDefinition, basket: &Basket) -> Price {
        let mut price = definition.price.clone();
        if let Some(percent) = definition
            .config
            .get("fee-percent")
            .and_then(|value| value.parse::<Decimal>().ok())
        {
            price.costs += (basket.totals.subtotal * percent / Decimal::from(100)).round_dp(2);
        }
        price
    }

    fn persist_config(
        &self,
        order_service: &mut OrderService,
        attributes: &BTreeMap<String, String>,
    ) {
        persist_recognized(order_service, attributes, PAYMENT_KEYS);
    }
}
