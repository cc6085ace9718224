//! Quantity-level cart operations over the unit-level backend.

use std::sync::Arc;

use pethub_core::{Cart, LineKey, LocalCacheEntry, ProductId, UserId};
use tracing::{debug, instrument, warn};

use super::backend::{CartBackend, RemoteLine};
use super::validator::{StockValidator, find_option};
use crate::catalog::ProductCatalog;
use crate::error::{CartError, Result};
use crate::session::Authenticator;

/// Adapter over the authoritative remote cart.
///
/// Every operation resolves the user through the [`Authenticator`] first,
/// so an anonymous caller gets `Unauthenticated` before any backend call.
#[derive(Clone)]
pub struct RemoteCart {
    backend: Arc<dyn CartBackend>,
    catalog: Arc<dyn ProductCatalog>,
    auth: Arc<dyn Authenticator>,
    validator: StockValidator,
}

impl RemoteCart {
    #[must_use]
    pub fn new(
        backend: Arc<dyn CartBackend>,
        catalog: Arc<dyn ProductCatalog>,
        auth: Arc<dyn Authenticator>,
    ) -> Self {
        Self {
            validator: StockValidator::new(Arc::clone(&catalog)),
            backend,
            catalog,
            auth,
        }
    }

    /// The current shopper.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` without a session.
    pub async fn current_user(&self) -> Result<UserId> {
        self.auth.current_user_id().await
    }

    #[must_use]
    pub const fn validator(&self) -> &StockValidator {
        &self.validator
    }

    /// Current lines for `user`; empty when the user has no cart.
    ///
    /// # Errors
    ///
    /// Returns the backend failure.
    pub async fn lines(&self, user: &UserId) -> Result<Vec<RemoteLine>> {
        Ok(self.backend.read_lines(user).await?.unwrap_or_default())
    }

    /// Lines for `user`, creating the cart first if it does not exist.
    pub(crate) async fn lines_or_create(&self, user: &UserId) -> Result<Vec<RemoteLine>> {
        match self.backend.read_lines(user).await? {
            Some(lines) => Ok(lines),
            None => {
                self.backend.ensure_cart(user).await?;
                Ok(Vec::new())
            }
        }
    }

    /// Apply `delta` unit changes to one line, strictly in sequence.
    ///
    /// Positive deltas add units, negative deltas remove them. Returns the
    /// number of units applied.
    ///
    /// # Errors
    ///
    /// A failure on the first unit is returned as is. A failure after `k`
    /// units is `PartiallyApplied { applied: k, .. }` wrapping it.
    #[instrument(skip(self), fields(user_id = %user, key = %key))]
    pub async fn apply_units(&self, user: &UserId, key: &LineKey, delta: i64) -> Result<u32> {
        let requested = u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX);
        let mut applied = 0;

        while applied < requested {
            let step = if delta > 0 {
                self.backend.add_unit(user, key).await
            } else {
                self.backend.reduce_unit(user, key).await
            };

            if let Err(e) = step {
                if applied == 0 {
                    return Err(e);
                }
                warn!(applied, requested, error = %e, "Unit loop stopped part way");
                return Err(CartError::PartiallyApplied {
                    key: key.clone(),
                    applied,
                    requested,
                    source: Box::new(e),
                });
            }
            applied += 1;
        }

        debug!(applied, "Unit changes applied");
        Ok(applied)
    }

    /// Add `quantity` units of a product size, after validating stock
    /// against what the remote cart already holds.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, a validation error, or the backend
    /// failure (possibly `PartiallyApplied`).
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: &ProductId, size: &str, quantity: u32) -> Result<()> {
        let user = self.current_user().await?;
        if quantity == 0 {
            return Ok(());
        }

        let key = LineKey::new(product_id.clone(), size);
        let lines = self.lines_or_create(&user).await?;
        let existing = quantity_of(&lines, &key);

        self.validator
            .validate(product_id, size, quantity, existing)
            .await?;
        self.apply_units(&user, &key, i64::from(quantity)).await?;
        Ok(())
    }

    /// Set a line to an absolute quantity with the fewest unit calls.
    ///
    /// A target of zero removes the line in one call. Increases are
    /// stock-validated so that the target itself fits in stock.
    ///
    /// # Errors
    ///
    /// Returns `LineNotFound` if the line is not in the cart, a validation
    /// error, or the backend failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn change_quantity(&self, product_id: &ProductId, size: &str, target: u32) -> Result<()> {
        let user = self.current_user().await?;
        let key = LineKey::new(product_id.clone(), size);
        let lines = self.lines(&user).await?;

        let current = match lines.iter().find(|l| l.key == key) {
            Some(line) => line.quantity,
            None => return Err(CartError::LineNotFound(key)),
        };

        if target == 0 {
            return self.backend.remove_line(&user, &key).await;
        }
        if target > current {
            self.validator
                .validate(product_id, size, target - current, current)
                .await?;
        }

        self.apply_units(&user, &key, i64::from(target) - i64::from(current))
            .await?;
        Ok(())
    }

    /// Remove a line entirely.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` or the backend failure.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_item(&self, product_id: &ProductId, size: &str) -> Result<()> {
        let user = self.current_user().await?;
        self.backend
            .remove_line(&user, &LineKey::new(product_id.clone(), size))
            .await
    }

    /// Read the cart with catalog prices and display fields.
    ///
    /// Lines whose product or size no longer exists in the catalog are left
    /// out. Any other catalog failure fails the whole read, so a partial
    /// cart is never reported as the remote state.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, or the backend or catalog failure.
    #[instrument(skip(self))]
    pub async fn read_cart(&self) -> Result<Vec<LocalCacheEntry>> {
        let user = self.current_user().await?;
        let lines = self.lines(&user).await?;
        self.describe(lines).await
    }

    /// Read the cart as priced line items.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read_cart`].
    pub async fn cart(&self) -> Result<Cart> {
        let entries = self.read_cart().await?;
        Ok(Cart::new(entries.iter().map(LocalCacheEntry::to_line).collect()))
    }

    /// Remove the given lines for `user`, leaving every other line alone.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure; lines before it stay removed.
    #[instrument(skip(self, keys), fields(user_id = %user, lines = keys.len()))]
    pub async fn remove_lines(&self, user: &UserId, keys: &[LineKey]) -> Result<()> {
        for key in keys {
            self.backend.remove_line(user, key).await?;
        }
        Ok(())
    }

    async fn describe(&self, lines: Vec<RemoteLine>) -> Result<Vec<LocalCacheEntry>> {
        let mut entries = Vec::with_capacity(lines.len());
        for line in lines {
            let product = match self.catalog.get_product_display(&line.key.product_id).await {
                Ok(product) => product,
                Err(e) if e.is_not_found() => {
                    warn!(key = %line.key, "Skipping cart line with unknown product");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let Ok(option) = find_option(&product, &line.key.size) else {
                warn!(key = %line.key, "Skipping cart line with unknown size");
                continue;
            };

            entries.push(LocalCacheEntry {
                price: option.price,
                quantity: line.quantity,
                name: product.name.clone(),
                description: product.description.clone(),
                image: product.image.clone(),
                product_id: line.key.product_id,
                size: line.key.size,
            });
        }
        Ok(entries)
    }
}

fn quantity_of(lines: &[RemoteLine], key: &LineKey) -> u32 {
    lines
        .iter()
        .find(|l| &l.key == key)
        .map_or(0, |l| l.quantity)
}
