use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::price::Price;

/// Slot a delivery or payment option occupies in the basket. At most one
/// service per type.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Delivery,
    Payment,
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceType::Delivery => write!(f, "delivery"),
            ServiceType::Payment => write!(f, "payment"),
        }
    }
}

/// Delivery/payment option chosen for the order, copied from a catalog
/// service definition. Carries the price computed by the provider (rebate
/// zeroed) and the configuration attributes the provider chose to persist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderService {
    pub service_id: String,
    pub code: String,
    pub name: String,
    pub service_type: ServiceType,
    pub price: Price,
    pub attributes: BTreeMap<String, String>,
}
