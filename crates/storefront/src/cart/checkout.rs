//! Order assembly and submission.

use std::sync::Arc;

use async_trait::async_trait;
use pethub_core::{Cart, CartLineItem, Discount, LineKey, Order, OrderRecord, Price, UserId};
use tracing::{error, info, instrument};

use super::local::LocalCartStore;
use super::source::RemoteCart;
use crate::error::{CartError, Result};

/// Accepts assembled orders.
#[async_trait]
pub trait OrderFulfillment: Send + Sync {
    /// Submit an order. Resubmitting the same `idempotency_key` must not
    /// create a second order.
    async fn submit(&self, order: &Order) -> Result<OrderRecord>;
}

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub order: Order,
    pub record: OrderRecord,
    /// Whether both the remote cart and the local cache were emptied.
    /// The order exists either way.
    pub cart_cleared: bool,
}

/// Turns a cart into a submitted order.
#[derive(Clone)]
pub struct OrderAssembler {
    fulfillment: Arc<dyn OrderFulfillment>,
    remote: RemoteCart,
    local: Arc<dyn LocalCartStore>,
    shipping: Price,
}

impl OrderAssembler {
    #[must_use]
    pub fn new(
        fulfillment: Arc<dyn OrderFulfillment>,
        remote: RemoteCart,
        local: Arc<dyn LocalCartStore>,
        shipping: Price,
    ) -> Self {
        Self {
            fulfillment,
            remote,
            local,
            shipping,
        }
    }

    /// Snapshot a cart into a pending order.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart` if the cart has no lines.
    pub fn assemble(&self, user: UserId, cart: &Cart, discount: Discount) -> Result<Order> {
        if cart.is_empty() {
            return Err(CartError::EmptyCart);
        }
        Ok(Order::from_cart(user, cart, self.shipping, discount))
    }

    /// Submit `cart` as an order, then remove the ordered lines from the
    /// remote cart and empty the local cache.
    ///
    /// Remote lines that are not part of the order are left in place.
    ///
    /// Clearing is best effort: a failure there is logged and reported as
    /// `cart_cleared = false`, since the order has already been placed.
    ///
    /// # Errors
    ///
    /// Returns `EmptyCart` before contacting anything, `Unauthenticated`,
    /// or the submission failure.
    #[instrument(skip(self, cart), fields(lines = cart.items.len()))]
    pub async fn checkout(&self, cart: &Cart, discount: Discount) -> Result<Checkout> {
        if cart.is_empty() {
            return Err(CartError::EmptyCart);
        }

        let user = self.remote.current_user().await?;
        let order = self.assemble(user.clone(), cart, discount)?;
        let record = self.fulfillment.submit(&order).await?;
        info!(
            order_id = %record.id,
            order_code = %record.order_code,
            total = %order.totals.total,
            "Order submitted"
        );

        let ordered: Vec<LineKey> = order.items.iter().map(CartLineItem::key).collect();
        let remote_cleared = match self.remote.remove_lines(&user, &ordered).await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Order placed but remote cart was not cleared");
                false
            }
        };
        let local_cleared = match self.local.clear().await {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "Order placed but local cart cache was not cleared");
                false
            }
        };

        Ok(Checkout {
            order,
            record,
            cart_cleared: remote_cleared && local_cleared,
        })
    }
}
