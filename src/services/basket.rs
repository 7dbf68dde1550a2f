use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument};

use crate::catalog::{
    CouponStore, ProductCatalog, ProductKind, ProductRecord, ServiceCatalog, VariantRecord,
};
use crate::config::AppConfig;
use crate::coupons::CouponProviderRegistry;
use crate::entities::address::{AddressInput, AddressType, OrderAddress};
use crate::entities::attribute::{build_order_attributes, AttributeRecord, OrderAttributeKind};
use crate::entities::basket::Basket;
use crate::entities::order_line::OrderLine;
use crate::entities::order_service::{OrderService, ServiceType};
use crate::entities::price::lowest_price;
use crate::errors::BasketError;
use crate::events::{Event, EventSender};
use crate::service_selection::ServiceProviderRegistry;
use crate::session::SessionStore;

/// Options steering `add_product`.
///
/// `variant` (default true) resolves selection products to the sub-product
/// identified by the variant attribute ids; turning it off adds the
/// selection product itself when resolution fails. `stock` is carried for
/// embeddings that run a warehouse check around this layer.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct AddProductOptions {
    #[serde(default = "default_true")]
    pub variant: bool,
    #[serde(default = "default_true")]
    pub stock: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AddProductOptions {
    fn default() -> Self {
        Self {
            variant: true,
            stock: true,
        }
    }
}

/// Input for adding a product to the basket.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct AddProductInput {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default)]
    pub options: AddProductOptions,
    #[serde(default)]
    pub variant_attribute_ids: Vec<String>,
    #[serde(default)]
    pub config_attribute_ids: Vec<String>,
    #[serde(default)]
    pub hidden_attribute_ids: Vec<String>,
    #[serde(default)]
    pub custom_attribute_values: BTreeMap<String, String>,
    #[serde(default)]
    pub stock_type: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl AddProductInput {
    pub fn new(product_id: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            quantity: 1,
            ..Default::default()
        }
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }
}

/// Collaborators the basket controller works against.
#[derive(Clone)]
pub struct BasketContext {
    pub session_store: Arc<dyn SessionStore>,
    pub products: Arc<dyn ProductCatalog>,
    pub coupons: Arc<dyn CouponStore>,
    pub services: Arc<dyn ServiceCatalog>,
    pub coupon_providers: Arc<CouponProviderRegistry>,
    pub service_providers: Arc<ServiceProviderRegistry>,
    pub event_sender: Arc<EventSender>,
    pub config: Arc<AppConfig>,
}

/// Frontend basket controller.
///
/// Mutates the session-scoped basket aggregate and writes it through to the
/// session store after every successful operation. Mutations are prepared on
/// a draft copy and committed only after the store accepted the write, so a
/// failed operation leaves both the in-memory and the persisted basket
/// unchanged.
pub struct BasketService {
    context: BasketContext,
    session_key: String,
    basket: Basket,
}

impl BasketService {
    /// Loads the basket stored for `session_key`, starting fresh if the
    /// session has no state yet.
    pub async fn load(
        context: BasketContext,
        session_key: impl Into<String>,
    ) -> Result<Self, BasketError> {
        let session_key = session_key.into();
        let basket = context
            .session_store
            .load(&session_key)
            .await?
            .unwrap_or_default();

        Ok(Self {
            context,
            session_key,
            basket,
        })
    }

    /// Returns the current basket.
    pub fn get(&self) -> &Basket {
        &self.basket
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// Empties the basket, removing all products, addresses, services and
    /// coupons.
    #[instrument(skip(self), fields(session = %self.session_key))]
    pub async fn clear(&mut self) -> Result<(), BasketError> {
        self.commit(Basket::new()).await?;

        self.context
            .event_sender
            .send_or_log(Event::BasketCleared {
                session: self.session_key.clone(),
            })
            .await;

        info!("cleared basket");
        Ok(())
    }

    /// Explicitly persists the basket; a no-op when nothing changed.
    pub async fn save(&mut self) -> Result<(), BasketError> {
        if self.basket.is_modified() {
            self.context
                .session_store
                .store(&self.session_key, &self.basket)
                .await?;
            self.basket.mark_clean();
        }
        Ok(())
    }

    /// Adds a categorized product to the basket.
    ///
    /// Copies the catalog product into an order line, resolves the
    /// applicable tiered price for the requested quantity, builds the
    /// config/hidden/custom attribute set and zeroes the catalog rebate.
    /// Selection products are resolved to a sub-product when the variant
    /// option is enabled. Returns the position of the new line.
    #[instrument(skip(self, input), fields(session = %self.session_key, product = %input.product_id))]
    pub async fn add_product(&mut self, input: AddProductInput) -> Result<usize, BasketError> {
        if input.quantity == 0 {
            return Err(BasketError::InvalidQuantity);
        }

        let product = self
            .context
            .products
            .get_product(&input.product_id)
            .await?
            .ok_or_else(|| BasketError::ProductUnavailable(input.product_id.clone()))?;

        let (selected, variant) = self.resolve_selection(&product, &input).await?;

        let mut attribute_base: Vec<AttributeRecord> = product.attributes.clone();
        if let Some(selected) = selected.as_ref() {
            attribute_base.extend(selected.attributes.iter().cloned());
        }
        let effective = selected.as_ref().unwrap_or(&product);

        let tiers = if effective.price_tiers.is_empty() {
            &product.price_tiers
        } else {
            &effective.price_tiers
        };
        let mut price = lowest_price(tiers, input.quantity)?;

        let mut attributes = Vec::new();
        if let Some(variant) = variant {
            attributes.extend(build_order_attributes(
                &attribute_base,
                &variant.attribute_ids,
                OrderAttributeKind::Variant,
                None,
            )?);
        }
        attributes.extend(build_order_attributes(
            &attribute_base,
            &input.config_attribute_ids,
            OrderAttributeKind::Config,
            None,
        )?);
        attributes.extend(build_order_attributes(
            &attribute_base,
            &input.hidden_attribute_ids,
            OrderAttributeKind::Hidden,
            None,
        )?);
        let custom_ids: Vec<String> = input.custom_attribute_values.keys().cloned().collect();
        attributes.extend(build_order_attributes(
            &attribute_base,
            &custom_ids,
            OrderAttributeKind::Custom,
            Some(&input.custom_attribute_values),
        )?);

        // catalog rebates make way for rebates granted on the order
        price.clear_rebate();

        let mut line = OrderLine::new(
            effective.id.clone(),
            effective.code.clone(),
            effective.name.clone(),
            input.quantity,
            price,
        );
        line.stock_type = input
            .stock_type
            .clone()
            .unwrap_or_else(|| self.context.config.default_stock_type.clone());
        line.attributes = attributes;
        line.parent_product_id = selected.as_ref().map(|_| product.id.clone());

        let mut draft = self.basket.clone();
        let position = draft.add_product(line);
        self.commit(draft).await?;

        self.context
            .event_sender
            .send_or_log(Event::ProductAdded {
                session: self.session_key.clone(),
                position,
                product_code: effective.code.clone(),
                quantity: input.quantity,
            })
            .await;

        info!(position, "added product to basket");
        Ok(position)
    }

    /// Deletes the line at `position` and re-indexes the remainder.
    #[instrument(skip(self), fields(session = %self.session_key))]
    pub async fn delete_product(&mut self, position: usize) -> Result<(), BasketError> {
        let line = self
            .basket
            .product(position)
            .ok_or(BasketError::PositionNotFound(position))?;

        if line.immutable {
            return Err(BasketError::ImmutableLine(position));
        }

        let mut draft = self.basket.clone();
        draft.remove_product(position);
        self.commit(draft).await?;

        self.context
            .event_sender
            .send_or_log(Event::ProductRemoved {
                session: self.session_key.clone(),
                position,
            })
            .await;

        info!(position, "removed product from basket");
        Ok(())
    }

    /// Edits quantity and attributes of the line at `position`.
    ///
    /// The price is re-resolved for the new quantity from the product's
    /// current price list; attributes whose code appears in
    /// `config_attribute_codes` are removed. The line is replaced in place
    /// (delete + reinsert at the original position).
    #[instrument(skip(self, config_attribute_codes), fields(session = %self.session_key))]
    pub async fn edit_product(
        &mut self,
        position: usize,
        quantity: u32,
        _options: AddProductOptions,
        config_attribute_codes: &[String],
    ) -> Result<(), BasketError> {
        if quantity == 0 {
            return Err(BasketError::InvalidQuantity);
        }

        let line = self
            .basket
            .product(position)
            .ok_or(BasketError::PositionNotFound(position))?;

        if line.immutable {
            return Err(BasketError::ImmutableLine(position));
        }

        let mut line = line.clone();
        line.quantity = quantity;
        line.remove_attributes(config_attribute_codes);

        let product = self
            .context
            .products
            .find_product_by_code(&line.product_code)
            .await?
            .ok_or_else(|| BasketError::ProductUnavailable(line.product_code.clone()))?;

        // articles resolved from a selection may price through the parent
        let mut tiers = product.price_tiers;
        if tiers.is_empty() {
            if let Some(parent_id) = &line.parent_product_id {
                if let Some(parent) = self.context.products.get_product(parent_id).await? {
                    tiers = parent.price_tiers;
                }
            }
        }

        let mut price = lowest_price(&tiers, quantity)?;
        price.clear_rebate();
        line.price = price;

        let mut draft = self.basket.clone();
        draft.remove_product(position);
        draft.insert_product(line, position);
        self.commit(draft).await?;

        self.context
            .event_sender
            .send_or_log(Event::ProductEdited {
                session: self.session_key.clone(),
                position,
                quantity,
            })
            .await;

        info!(position, quantity, "edited basket product");
        Ok(())
    }

    /// Adds the given coupon code and applies its effect to the basket.
    #[instrument(skip(self), fields(session = %self.session_key))]
    pub async fn add_coupon(&mut self, code: &str) -> Result<(), BasketError> {
        if self.basket.has_coupon(code) {
            return Err(BasketError::DuplicateCoupon(code.to_string()));
        }

        let record = self
            .context
            .coupons
            .find_code_record(code)
            .await?
            .filter(|record| record.is_active(Utc::now()))
            .ok_or_else(|| BasketError::InvalidCoupon(code.to_string()))?;

        let definition = self
            .context
            .coupons
            .find_coupon_definition(&record.coupon_id)
            .await?
            .ok_or_else(|| BasketError::CouponUnavailable(code.to_string()))?;

        let provider = self.context.coupon_providers.resolve(&definition.provider)?;

        if !provider.is_eligible(&definition, &self.basket) {
            return Err(BasketError::CouponNotEligible(code.to_string()));
        }

        let mut draft = self.basket.clone();
        provider.apply(&definition, code, &mut draft).await?;
        self.commit(draft).await?;

        self.context
            .event_sender
            .send_or_log(Event::CouponApplied {
                session: self.session_key.clone(),
                code: code.to_string(),
            })
            .await;

        info!(code, "applied coupon");
        Ok(())
    }

    /// Removes the given coupon code and its effects from the basket.
    #[instrument(skip(self), fields(session = %self.session_key))]
    pub async fn delete_coupon(&mut self, code: &str) -> Result<(), BasketError> {
        let record = self
            .context
            .coupons
            .find_code_record(code)
            .await?
            .ok_or_else(|| BasketError::InvalidCoupon(code.to_string()))?;

        let definition = self
            .context
            .coupons
            .find_coupon_definition(&record.coupon_id)
            .await?
            .ok_or_else(|| BasketError::CouponUnavailable(code.to_string()))?;

        let provider = self.context.coupon_providers.resolve(&definition.provider)?;

        let mut draft = self.basket.clone();
        provider.remove(code, &mut draft);
        self.commit(draft).await?;

        self.context
            .event_sender
            .send_or_log(Event::CouponRemoved {
                session: self.session_key.clone(),
                code: code.to_string(),
            })
            .await;

        info!(code, "removed coupon");
        Ok(())
    }

    /// Sets, replaces or removes the address stored under `address_type`.
    #[instrument(skip(self, value), fields(session = %self.session_key, address_type = %address_type))]
    pub async fn set_address(
        &mut self,
        address_type: AddressType,
        value: AddressInput,
    ) -> Result<(), BasketError> {
        let mut draft = self.basket.clone();
        let removed = match value {
            AddressInput::Existing(customer) => {
                draft.set_address(OrderAddress::from_customer(address_type, &customer));
                false
            }
            AddressInput::Raw(map) => {
                draft.set_address(OrderAddress::from_map(address_type, &map)?);
                false
            }
            AddressInput::Remove => {
                draft.delete_address(address_type);
                true
            }
        };
        self.commit(draft).await?;

        let event = if removed {
            Event::AddressRemoved {
                session: self.session_key.clone(),
                address_type,
            }
        } else {
            Event::AddressSet {
                session: self.session_key.clone(),
                address_type,
            }
        };
        self.context.event_sender.send_or_log(event).await;

        info!("updated basket address");
        Ok(())
    }

    /// Sets the delivery/payment service for the given type slot.
    ///
    /// The provider validates the customer's configuration attributes
    /// against its declared schema: keys it doesn't recognize are reported
    /// as unknown, recognized keys with a non-null validation result fail
    /// with the provider's message. The provider computes the price
    /// contribution (rebate zeroed) and persists its chosen configuration
    /// onto the order service record.
    #[instrument(skip(self, attributes), fields(session = %self.session_key, service_type = %service_type, service = %service_id))]
    pub async fn set_service(
        &mut self,
        service_type: ServiceType,
        service_id: &str,
        attributes: BTreeMap<String, String>,
    ) -> Result<(), BasketError> {
        let definition = self
            .context
            .services
            .get_service(service_id)
            .await?
            .ok_or_else(|| BasketError::ServiceUnavailable(service_id.to_string()))?;

        if definition.service_type != service_type {
            return Err(BasketError::ServiceUnavailable(format!(
                "{} is not a {} service",
                service_id, service_type
            )));
        }

        let provider = self
            .context
            .service_providers
            .resolve(&definition.provider)?;

        let result = provider.validate_config(&attributes);

        let unknown: Vec<String> = attributes
            .keys()
            .filter(|key| !result.contains_key(*key))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(BasketError::UnknownServiceAttribute { keys: unknown });
        }

        for value in result.values() {
            if let Some(message) = value {
                return Err(BasketError::InvalidServiceAttribute(message.clone()));
            }
        }

        let mut price = provider.calc_price(&definition, &self.basket);
        price.clear_rebate();

        let mut order_service = OrderService {
            service_id: definition.id.clone(),
            code: definition.code.clone(),
            name: definition.name.clone(),
            service_type,
            price,
            attributes: BTreeMap::new(),
        };
        provider.persist_config(&mut order_service, &attributes);

        let mut draft = self.basket.clone();
        draft.set_service(order_service);
        self.commit(draft).await?;

        self.context
            .event_sender
            .send_or_log(Event::ServiceSet {
                session: self.session_key.clone(),
                service_type,
                service_code: definition.code.clone(),
            })
            .await;

        info!("set basket service");
        Ok(())
    }

    /// Recalculates, persists and adopts the draft. The in-memory basket is
    /// only replaced once the session store accepted the write.
    async fn commit(&mut self, mut draft: Basket) -> Result<(), BasketError> {
        draft.recalculate();
        self.context
            .session_store
            .store(&self.session_key, &draft)
            .await?;
        draft.mark_clean();
        self.basket = draft;
        Ok(())
    }

    /// Resolves a selection product to the sub-product identified by the
    /// variant attribute ids. Returns the sub-product and the matched
    /// variant, or nothing when the parent itself should be used.
    async fn resolve_selection(
        &self,
        product: &ProductRecord,
        input: &AddProductInput,
    ) -> Result<(Option<ProductRecord>, Option<VariantRecord>), BasketError> {
        if product.kind != ProductKind::Selection {
            return Ok((None, None));
        }

        let matches: Vec<&VariantRecord> = product
            .variants
            .iter()
            .filter(|variant| {
                !variant.attribute_ids.is_empty()
                    && variant.attribute_ids.len() == input.variant_attribute_ids.len()
                    && variant
                        .attribute_ids
                        .iter()
                        .all(|id| input.variant_attribute_ids.contains(id))
            })
            .collect();

        if let [variant] = matches.as_slice() {
            if let Some(sub) = self.context.products.get_product(&variant.product_id).await? {
                return Ok((Some(sub), Some((*variant).clone())));
            }
        }

        if input.options.variant {
            return Err(BasketError::ProductUnavailable(format!(
                "no unique article in selection \"{}\" for the given variant attributes",
                product.code
            )));
        }

        // caller explicitly allowed adding the selection product itself
        Ok((None, None))
    }
}
