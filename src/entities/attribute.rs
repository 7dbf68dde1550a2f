use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::BasketError;

/// Category of an order line attribute.
///
/// Variant attributes identify a sub-product of a selection product, config
/// attributes are visible customer choices, hidden attributes travel with the
/// line without being shown, custom attributes carry arbitrary entered values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderAttributeKind {
    Variant,
    Config,
    Hidden,
    Custom,
}

/// Attribute definition as referenced by a catalog product.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    pub id: String,
    pub code: String,
    pub name: String,
    pub value: String,
}

/// Attribute stored on an order line, tagged by category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAttribute {
    pub attribute_id: String,
    pub kind: OrderAttributeKind,
    pub code: String,
    pub name: String,
    pub value: String,
}

/// Resolves raw attribute ids against the records referenced by the product
/// and produces typed order line attributes of the given kind.
///
/// For [`OrderAttributeKind::Custom`] the stored value is taken from
/// `custom_values` instead of the attribute record. Ids the product doesn't
/// reference are collected and reported as unavailable.
pub fn build_order_attributes(
    available: &[AttributeRecord],
    ids: &[String],
    kind: OrderAttributeKind,
    custom_values: Option<&BTreeMap<String, String>>,
) -> Result<Vec<OrderAttribute>, BasketError> {
    let mut attributes = Vec::with_capacity(ids.len());
    let mut missing = Vec::new();

    for id in ids {
        match available.iter().find(|record| &record.id == id) {
            Some(record) => {
                let value = match custom_values.and_then(|values| values.get(id)) {
                    Some(custom) => custom.clone(),
                    None => record.value.clone(),
                };
                attributes.push(OrderAttribute {
                    attribute_id: record.id.clone(),
                    kind,
                    code: record.code.clone(),
                    name: record.name.clone(),
                    value,
                });
            }
            None => missing.push(id.clone()),
        }
    }

    if !missing.is_empty() {
        return Err(BasketError::AttributeUnavailable(missing));
    }

    Ok(attributes)
}
