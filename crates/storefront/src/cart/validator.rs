//! Stock validation against the product catalog.

use std::sync::Arc;

use pethub_core::{LineKey, Product, ProductId, ProductOption};
use tracing::instrument;

use crate::catalog::ProductCatalog;
use crate::error::CartError;

/// Check that `existing + requested` units of an option fit in its stock.
///
/// # Errors
///
/// Returns `CartError::StockExceeded` with the shortfall otherwise.
pub fn check_stock(
    key: &LineKey,
    option: &ProductOption,
    requested: u32,
    existing: u32,
) -> Result<(), CartError> {
    let wanted = u64::from(existing) + u64::from(requested);
    let available = u64::from(option.stock);
    if wanted <= available {
        return Ok(());
    }

    Err(CartError::StockExceeded {
        key: key.clone(),
        available: option.stock,
        in_cart: existing,
        requested,
        shortfall: u32::try_from(wanted - available).unwrap_or(u32::MAX),
    })
}

/// Find the option for `size`.
///
/// # Errors
///
/// Returns `CartError::OptionNotFound` if the product has no such size.
pub fn find_option<'a>(product: &'a Product, size: &str) -> Result<&'a ProductOption, CartError> {
    product.option(size).ok_or_else(|| CartError::OptionNotFound {
        product_id: product.id.clone(),
        size: size.to_string(),
    })
}

/// Validates requested quantities against live catalog stock.
#[derive(Clone)]
pub struct StockValidator {
    catalog: Arc<dyn ProductCatalog>,
}

impl StockValidator {
    #[must_use]
    pub fn new(catalog: Arc<dyn ProductCatalog>) -> Self {
        Self { catalog }
    }

    /// Validate adding `requested` units to `existing` units already in the
    /// cart. Returns the matched option so callers can use its price.
    ///
    /// # Errors
    ///
    /// Returns `OptionNotFound`, `StockExceeded`, or the catalog's failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn validate(
        &self,
        product_id: &ProductId,
        size: &str,
        requested: u32,
        existing: u32,
    ) -> Result<ProductOption, CartError> {
        let product = self.catalog.get_product(product_id).await?;
        let option = find_option(&product, size)?;
        check_stock(
            &LineKey::new(product_id.clone(), size),
            option,
            requested,
            existing,
        )?;
        Ok(option.clone())
    }
}
