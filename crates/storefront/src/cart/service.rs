//! Cart facade used by callers: remote first, local mirror, offline reads.

use std::sync::Arc;

use pethub_core::{Cart, Discount, LocalCacheEntry, Price, ProductId};
use tracing::{instrument, warn};

use super::checkout::{Checkout, OrderAssembler, OrderFulfillment};
use super::local::LocalCartStore;
use super::reconcile::{Reconciler, SyncReport};
use super::source::RemoteCart;
use crate::error::Result;

/// Where a cart view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartSource {
    Remote,
    /// The remote could not be read; this is the last mirrored state.
    Local,
}

/// A rendered cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartView {
    pub entries: Vec<LocalCacheEntry>,
    pub source: CartSource,
}

impl CartView {
    #[must_use]
    pub fn cart(&self) -> Cart {
        Cart::new(self.entries.iter().map(LocalCacheEntry::to_line).collect())
    }

    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.cart().subtotal()
    }

    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.entries
            .iter()
            .map(|e| e.quantity)
            .fold(0, u32::saturating_add)
    }

    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.source == CartSource::Local
    }
}

/// Cart operations for one shopper session.
#[derive(Clone)]
pub struct CartService {
    remote: RemoteCart,
    local: Arc<dyn LocalCartStore>,
    reconciler: Reconciler,
    assembler: OrderAssembler,
}

impl CartService {
    #[must_use]
    pub fn new(
        remote: RemoteCart,
        local: Arc<dyn LocalCartStore>,
        fulfillment: Arc<dyn OrderFulfillment>,
        shipping: Price,
        retain_failed_sync: bool,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(remote.clone(), Arc::clone(&local), retain_failed_sync),
            assembler: OrderAssembler::new(fulfillment, remote.clone(), Arc::clone(&local), shipping),
            remote,
            local,
        }
    }

    #[must_use]
    pub const fn remote(&self) -> &RemoteCart {
        &self.remote
    }

    /// Add units of a product size.
    ///
    /// # Errors
    ///
    /// See [`RemoteCart::add_item`]. The local cache is untouched on error.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_item(&self, product_id: &ProductId, size: &str, quantity: u32) -> Result<()> {
        self.remote.add_item(product_id, size, quantity).await?;
        self.mirror().await;
        Ok(())
    }

    /// Set a line to an absolute quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// See [`RemoteCart::change_quantity`].
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn change_quantity(&self, product_id: &ProductId, size: &str, quantity: u32) -> Result<()> {
        self.remote.change_quantity(product_id, size, quantity).await?;
        self.mirror().await;
        Ok(())
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// See [`RemoteCart::remove_item`].
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove_item(&self, product_id: &ProductId, size: &str) -> Result<()> {
        self.remote.remove_item(product_id, size).await?;
        self.mirror().await;
        Ok(())
    }

    /// Read the cart, falling back to the local mirror when the remote
    /// cannot be reached.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, or a non-network failure. A network
    /// failure with an unreadable cache also surfaces the cache error.
    #[instrument(skip(self))]
    pub async fn read_cart(&self) -> Result<CartView> {
        match self.remote.read_cart().await {
            Ok(entries) => Ok(CartView {
                entries,
                source: CartSource::Remote,
            }),
            Err(e) if e.is_network() => {
                warn!(error = %e, "Remote cart unreachable, serving local cache");
                Ok(CartView {
                    entries: self.local.snapshot().await?,
                    source: CartSource::Local,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Replay the local cache into the remote cart.
    ///
    /// # Errors
    ///
    /// See [`Reconciler::sync`].
    pub async fn sync(&self) -> Result<SyncReport> {
        self.reconciler.sync().await
    }

    /// Check out the remote cart with a free-text discount.
    ///
    /// The cart is read from the remote only; a stale local copy is never
    /// turned into an order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart`, `Unauthenticated`, or the read/submit failure.
    #[instrument(skip(self))]
    pub async fn checkout(&self, discount: &str) -> Result<Checkout> {
        let cart = self.remote.cart().await?;
        self.assembler.checkout(&cart, Discount::parse(discount)).await
    }

    /// Mirror the authoritative cart into the local cache.
    ///
    /// The mutation already succeeded, so failures here are only logged.
    async fn mirror(&self) {
        let entries = match self.remote.read_cart().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not read cart back for local mirror");
                return;
            }
        };
        if let Err(e) = self.local.persist(&entries).await {
            warn!(error = %e, "Could not write local cart cache");
        }
    }
}

impl From<CartView> for Cart {
    fn from(view: CartView) -> Self {
        view.cart()
    }
}
