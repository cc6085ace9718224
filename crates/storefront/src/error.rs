//! Unified error handling for cart, checkout, and session operations.
//!
//! Validation errors (`OptionNotFound`, `StockExceeded`, `MissingField`,
//! `EmptyCart`) are meant for user-facing messages. `Network` wraps every
//! transport or backend failure; reads fall back to the local cache on it,
//! mutations surface it.

use pethub_core::{LineKey, ProductId};
use thiserror::Error;

use crate::api::ApiError;
use crate::cart::local::CacheError;

/// Error type for the cart subsystem and the account services.
#[derive(Debug, Error)]
pub enum CartError {
    /// No logged-in shopper.
    #[error("Not logged in")]
    Unauthenticated,

    /// The product has no option with the requested size.
    #[error("Product {product_id} has no size '{size}'")]
    OptionNotFound { product_id: ProductId, size: String },

    /// The requested quantity exceeds available stock.
    #[error(
        "Only {available} of {key} in stock; {in_cart} already in cart, {requested} more requested ({shortfall} short)"
    )]
    StockExceeded {
        key: LineKey,
        available: u32,
        in_cart: u32,
        requested: u32,
        shortfall: u32,
    },

    /// A required input field was left blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Checkout was attempted with no line items.
    #[error("Cart is empty")]
    EmptyCart,

    /// The line is not in the cart.
    #[error("{0} is not in the cart")]
    LineNotFound(LineKey),

    /// The backend refused a unit because it is out of stock.
    #[error("{0} is out of stock")]
    OutOfStock(LineKey),

    /// A multi-unit mutation failed part way; `applied` units are in the
    /// remote cart.
    #[error("Applied {applied} of {requested} unit changes to {key} before failing: {source}")]
    PartiallyApplied {
        key: LineKey,
        applied: u32,
        requested: u32,
        #[source]
        source: Box<CartError>,
    },

    /// Transport or backend failure.
    #[error("Network error: {0}")]
    Network(ApiError),

    /// Local cart cache could not be read or written.
    #[error("Local cache error: {0}")]
    LocalCache(#[from] CacheError),
}

impl From<ApiError> for CartError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => Self::Unauthenticated,
            other => Self::Network(other),
        }
    }
}

impl CartError {
    /// Whether this error (or the failure underneath a partial apply) is a
    /// transport or backend failure rather than a validation error.
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::PartiallyApplied { source, .. } => source.is_network(),
            _ => false,
        }
    }

    /// Whether the backend or catalog reported the thing as missing, as
    /// opposed to failing to answer.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::Network(ApiError::NotFound(_)) | Self::OptionNotFound { .. }
        )
    }

    /// Shortfall carried by a stock error, for user messaging.
    #[must_use]
    pub const fn shortfall(&self) -> Option<u32> {
        match self {
            Self::StockExceeded { shortfall, .. } => Some(*shortfall),
            _ => None,
        }
    }
}

/// Result type alias for `CartError`.
pub type Result<T> = std::result::Result<T, CartError>;
