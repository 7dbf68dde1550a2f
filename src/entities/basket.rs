use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::address::{AddressType, OrderAddress};
use super::order_line::OrderLine;
use super::order_service::{OrderService, ServiceType};

/// Totals recomputed after every mutation.
///
/// `subtotal` sums line values (coupon rebate lines carry negative values, so
/// granted rebates are contained exactly once), `service_total` sums the
/// delivery/payment contributions, `rebate_total` is informational.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasketTotals {
    pub subtotal: Decimal,
    pub costs: Decimal,
    pub service_total: Decimal,
    pub rebate_total: Decimal,
    pub total: Decimal,
    pub currency: String,
}

/// Session-scoped draft order: product lines, addresses, chosen services and
/// applied coupons.
///
/// Product positions are dense array indices and are re-indexed on delete;
/// they are not stable identifiers. Coupon effects are tracked by line id
/// instead, which survives re-indexing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Basket {
    pub products: Vec<OrderLine>,
    pub addresses: BTreeMap<AddressType, OrderAddress>,
    pub services: BTreeMap<ServiceType, OrderService>,
    pub coupons: BTreeMap<String, Vec<Uuid>>,
    pub totals: BasketTotals,
    #[serde(skip)]
    modified: bool,
}

impl Basket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the basket holds changes not yet written to the session store.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Called after a successful write-through to the session store.
    pub fn mark_clean(&mut self) {
        self.modified = false;
    }

    pub fn product(&self, position: usize) -> Option<&OrderLine> {
        self.products.get(position)
    }

    /// Appends a line and returns its position.
    pub fn add_product(&mut self, line: OrderLine) -> usize {
        self.products.push(line);
        self.modified = true;
        self.products.len() - 1
    }

    /// Inserts a line at the given position; positions past the end are
    /// clamped so a delete + reinsert of the last line round-trips.
    pub fn insert_product(&mut self, line: OrderLine, position: usize) -> usize {
        let position = position.min(self.products.len());
        self.products.insert(position, line);
        self.modified = true;
        position
    }

    /// Removes the line at `position` and re-indexes the remainder.
    pub fn remove_product(&mut self, position: usize) -> Option<OrderLine> {
        if position >= self.products.len() {
            return None;
        }
        self.modified = true;
        Some(self.products.remove(position))
    }

    pub fn address(&self, address_type: AddressType) -> Option<&OrderAddress> {
        self.addresses.get(&address_type)
    }

    pub fn set_address(&mut self, address: OrderAddress) {
        self.addresses.insert(address.address_type, address);
        self.modified = true;
    }

    pub fn delete_address(&mut self, address_type: AddressType) -> Option<OrderAddress> {
        let removed = self.addresses.remove(&address_type);
        self.modified = true;
        removed
    }

    pub fn service(&self, service_type: ServiceType) -> Option<&OrderService> {
        self.services.get(&service_type)
    }

    pub fn set_service(&mut self, service: OrderService) {
        self.services.insert(service.service_type, service);
        self.modified = true;
    }

    /// Registers a coupon code together with the lines it injected. The
    /// lines are forced immutable so they can't be edited away manually.
    pub fn add_coupon_lines(&mut self, code: impl Into<String>, mut lines: Vec<OrderLine>) {
        let mut ids = Vec::with_capacity(lines.len());
        for line in &mut lines {
            line.immutable = true;
            ids.push(line.id);
        }
        self.products.append(&mut lines);
        self.coupons.insert(code.into(), ids);
        self.modified = true;
    }

    /// Removes a coupon entry and every line it injected. Returns false if
    /// the code was not applied.
    pub fn remove_coupon(&mut self, code: &str) -> bool {
        match self.coupons.remove(code) {
            Some(ids) => {
                self.products.retain(|line| !ids.contains(&line.id));
                self.modified = true;
                true
            }
            None => false,
        }
    }

    pub fn has_coupon(&self, code: &str) -> bool {
        self.coupons.contains_key(code)
    }

    /// Recomputes the totals from lines, services and rebates. Consistent
    /// after any successful mutation: rebates are counted exactly once via
    /// the negative values of their lines.
    pub fn recalculate(&mut self) {
        let subtotal: Decimal = self.products.iter().map(OrderLine::line_total).sum();
        let costs: Decimal = self.products.iter().map(OrderLine::costs_total).sum();
        let rebate_total: Decimal = self.products.iter().map(OrderLine::rebate_total).sum();
        let service_total: Decimal = self
            .services
            .values()
            .map(|service| service.price.value + service.price.costs)
            .sum();

        let currency = self
            .products
            .first()
            .map(|line| line.price.currency.clone())
            .or_else(|| {
                self.services
                    .values()
                    .next()
                    .map(|service| service.price.currency.clone())
            })
            .unwrap_or_else(|| self.totals.currency.clone());

        self.totals = BasketTotals {
            subtotal,
            costs,
            service_total,
            rebate_total,
            total: subtotal + costs + service_total,
            currency,
        };
    }
}
