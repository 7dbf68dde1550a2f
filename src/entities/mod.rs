//! Data model of the basket layer: value objects, order records and the
//! basket aggregate itself.

pub mod address;
pub mod attribute;
pub mod basket;
pub mod order_line;
pub mod order_service;
pub mod price;

pub use address::{AddressInput, AddressType, CustomerAddress, OrderAddress};
pub use attribute::{build_order_attributes, AttributeRecord, OrderAttribute, OrderAttributeKind};
pub use basket::{Basket, BasketTotals};
pub use order_line::OrderLine;
pub use order_service::{OrderService, ServiceType};
pub use price::{lowest_price, Price, PriceTier};
