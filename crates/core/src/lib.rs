//! PetHub Core - Shared domain types.
//!
//! This crate provides the types shared by the PetHub components:
//! - `storefront` - REST client library for catalog, cart, checkout and orders
//! - `cli` - Command-line front end over the storefront library
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no persistence. Cart subtotals, order totals and discount
//! parsing live here so every caller computes money the same way.
//!
//! # Modules
//!
//! - [`types`] - IDs, prices, cart lines, catalog products, orders and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
