//! Core types for PetHub.
//!
//! This module provides type-safe wrappers and domain types for the cart,
//! catalog, order, address book and review flows.

pub mod address;
pub mod cart;
pub mod catalog;
pub mod id;
pub mod order;
pub mod price;
pub mod review;
pub mod status;

pub use address::{Address, AddressDraft, DEFAULT_ADDRESS_LABEL};
pub use cart::{Cart, CartLineItem, LineKey, LocalCacheEntry};
pub use catalog::{ALL_FILTER, PriceTier, Product, ProductOption, SearchFilters};
pub use id::*;
pub use order::{DEFAULT_SHIPPING_FEE, Discount, Order, OrderRecord, OrderTotals};
pub use price::{CurrencyCode, Price};
pub use review::{Rating, Review};
pub use status::OrderStatus;
