//! Orchestration layer: the basket controller and the checkout service
//! lookup façade.

pub mod basket;
pub mod service_lookup;

pub use basket::{AddProductInput, AddProductOptions, BasketContext, BasketService};
pub use service_lookup::ServiceLookupService;
