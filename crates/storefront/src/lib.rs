//! PetHub storefront client library.
//!
//! Talks to the PetHub REST API and keeps the shopper's cart consistent
//! between the server-held cart and a durable local mirror: stock-checked
//! additions, offline reads, session-start reconciliation and checkout.
//! Favorites, order history with reviews, and the address book share the
//! same session.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod addresses;
pub mod api;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod favorites;
pub mod orders;
pub mod session;
pub mod state;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{CartError, Result};
pub use state::Storefront;
