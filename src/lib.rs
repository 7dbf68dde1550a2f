//! Storefront basket library
//!
//! This crate provides the frontend basket controller layer of an e-commerce
//! platform: a session-scoped order draft mutated by product, coupon, address
//! and service operations, persisted write-through to a session store.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod catalog;
pub mod config;
pub mod coupons;
pub mod entities;
pub mod errors;
pub mod events;
pub mod service_selection;
pub mod services;
pub mod session;

pub use catalog::{CouponStore, ProductCatalog, ServiceCatalog};
pub use entities::basket::Basket;
pub use errors::BasketError;
pub use services::basket::{AddProductInput, AddProductOptions, BasketContext, BasketService};
pub use session::SessionStore;
