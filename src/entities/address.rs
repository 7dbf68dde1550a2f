use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::BasketError;

/// Slot an address occupies in the basket. At most one address per type.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Payment,
    Delivery,
}

impl std::fmt::Display for AddressType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressType::Payment => write!(f, "payment"),
            AddressType::Delivery => write!(f, "delivery"),
        }
    }
}

/// Address stored at a customer account, copied verbatim into the basket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerAddress {
    pub company: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub address1: String,
    pub address2: Option<String>,
    pub postal: String,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub email: Option<String>,
    pub telephone: Option<String>,
}

/// Value accepted by `set_address`: copy an existing customer address, build
/// one from raw key/value input, or remove the slot.
#[derive(Clone, Debug)]
pub enum AddressInput {
    Existing(CustomerAddress),
    Raw(HashMap<String, String>),
    Remove,
}

/// Address attached to the basket under a type slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAddress {
    pub address_type: AddressType,
    pub company: Option<String>,
    pub firstname: String,
    pub lastname: String,
    pub address1: String,
    pub address2: Option<String>,
    pub postal: String,
    pub city: String,
    pub state: Option<String>,
    pub country: String,
    pub email: Option<String>,
    pub telephone: Option<String>,
}

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// Strips markup from customer-supplied input before it enters the order.
pub fn strip_tags(value: &str) -> String {
    TAG_RE.replace_all(value, "").into_owned()
}

const KNOWN_FIELDS: &[&str] = &[
    "company",
    "firstname",
    "lastname",
    "address1",
    "address2",
    "postal",
    "city",
    "state",
    "country",
    "email",
    "telephone",
];

const REQUIRED_FIELDS: &[&str] = &["lastname", "address1", "city"];

impl OrderAddress {
    /// Copies an existing customer address into a fresh order address of the
    /// given type.
    pub fn from_customer(address_type: AddressType, address: &CustomerAddress) -> Self {
        Self {
            address_type,
            company: address.company.clone(),
            firstname: address.firstname.clone(),
            lastname: address.lastname.clone(),
            address1: address.address1.clone(),
            address2: address.address2.clone(),
            postal: address.postal.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            country: address.country.clone(),
            email: address.email.clone(),
            telephone: address.telephone.clone(),
        }
    }

    /// Builds an order address from raw key/value input.
    ///
    /// Every value is sanitized before validation. Unknown keys, missing
    /// required fields and malformed values are collected into a per-field
    /// error map reported via [`BasketError::InvalidAddress`].
    pub fn from_map(
        address_type: AddressType,
        map: &HashMap<String, String>,
    ) -> Result<Self, BasketError> {
        let mut errors = HashMap::new();
        let mut clean: HashMap<&str, String> = HashMap::new();

        for (key, value) in map {
            match KNOWN_FIELDS.iter().copied().find(|field| *field == key.as_str()) {
                Some(field) => {
                    clean.insert(field, strip_tags(value).trim().to_string());
                }
                None => {
                    errors.insert(key.clone(), "unknown address property".to_string());
                }
            }
        }

        for field in REQUIRED_FIELDS {
            if clean.get(field).map_or(true, |value| value.is_empty()) {
                errors.insert((*field).to_string(), "value is required".to_string());
            }
        }

        if let Some(email) = clean.get("email") {
            if !email.is_empty() && !validator::validate_email(email.as_str()) {
                errors.insert("email".to_string(), "not a valid e-mail address".to_string());
            }
        }

        if !errors.is_empty() {
            return Err(BasketError::InvalidAddress { fields: errors });
        }

        let take = |field: &str| clean.get(field).cloned().unwrap_or_default();
        let take_opt = |field: &str| clean.get(field).filter(|v| !v.is_empty()).cloned();

        Ok(Self {
            address_type,
            company: take_opt("company"),
            firstname: take("firstname"),
            lastname: take("lastname"),
            address1: take("address1"),
            address2: take_opt("address2"),
            postal: take("postal"),
            city: take("city"),
            state: take_opt("state"),
            country: take("country"),
            email: take_opt("email"),
            telephone: take_opt("telephone"),
        })
    }
}
