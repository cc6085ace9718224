//! Order submission, order history and order reviews over the REST API.

use std::sync::Arc;

use async_trait::async_trait;
use pethub_core::{Order, OrderId, OrderRecord, Rating, Review, UserId};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::api::types::{
    CheckoutItem, CheckoutRequest, CheckoutResponse, OrderDto, OrderPatch, ReviewDto,
    ReviewRequest,
};
use crate::api::{ApiClient, ApiError, conversions, segment};
use crate::cart::OrderFulfillment;
use crate::error::Result;
use crate::session::Authenticator;

/// Build the checkout body for an order.
fn checkout_request(order: &Order) -> CheckoutRequest {
    CheckoutRequest {
        discount: order.totals.discount.amount(),
        subtotal: order.totals.subtotal.amount(),
        shipping: order.totals.shipping.amount(),
        items: order
            .items
            .iter()
            .map(|item| CheckoutItem {
                product_id: item.product_id.to_string(),
                size: item.size.clone(),
                quantity: item.quantity,
                price: item.unit_price.amount(),
            })
            .collect(),
        idempotency_key: order.idempotency_key,
    }
}

/// [`OrderFulfillment`] that posts to `/cart/{userId}/checkout`.
#[derive(Clone)]
pub struct HttpFulfillment {
    api: ApiClient,
}

impl HttpFulfillment {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl OrderFulfillment for HttpFulfillment {
    #[instrument(skip(self, order), fields(user_id = %order.user_id, key = %order.idempotency_key))]
    async fn submit(&self, order: &Order) -> Result<OrderRecord> {
        let body = checkout_request(order);
        let response: CheckoutResponse = self
            .api
            .post_json(
                &format!("/cart/{}/checkout", segment(order.user_id.as_str())),
                &body,
            )
            .await?;

        let mut record = conversions::convert_order(
            response.into_order(),
            &order.idempotency_key.to_string(),
        );
        if record.total.amount().is_zero() {
            record.total = order.totals.total;
        }
        if record.item_count == 0 {
            record.item_count = order.items.len();
        }
        Ok(record)
    }
}

/// Order history and review endpoints of the backend.
///
/// Responses are returned raw; [`OrderHistory`] reads them leniently so one
/// malformed order does not hide the rest.
#[async_trait]
pub trait OrderBackend: Send + Sync {
    /// Orders placed by a user.
    async fn orders_of(&self, user: &UserId) -> Result<Value>;

    /// One order document.
    async fn order(&self, id: &OrderId) -> Result<Value>;

    /// Store a review and return the stored document.
    async fn create_review(
        &self,
        user: &UserId,
        order: &OrderId,
        rating: Rating,
        comment: &str,
    ) -> Result<Value>;

    /// Flag an order as reviewed.
    async fn mark_reviewed(&self, order: &OrderId) -> Result<()>;

    /// Reviews written by the shopper behind the current token.
    async fn reviews_of_user(&self) -> Result<Value>;

    /// The review of one order; `Network(NotFound)` when there is none.
    async fn review_of_order(&self, order: &OrderId) -> Result<Value>;
}

/// [`OrderBackend`] over the PetHub REST API.
#[derive(Clone)]
pub struct HttpOrders {
    api: ApiClient,
}

impl HttpOrders {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl OrderBackend for HttpOrders {
    async fn orders_of(&self, user: &UserId) -> Result<Value> {
        Ok(self
            .api
            .get_json(&format!("/orders/user/{}", segment(user.as_str())))
            .await?)
    }

    async fn order(&self, id: &OrderId) -> Result<Value> {
        Ok(self
            .api
            .get_json(&format!("/orders/{}", segment(id.as_str())))
            .await?)
    }

    async fn create_review(
        &self,
        user: &UserId,
        order: &OrderId,
        rating: Rating,
        comment: &str,
    ) -> Result<Value> {
        let body = ReviewRequest {
            order_id: order.as_str(),
            rating: rating.stars(),
            comment,
            user_id: user.as_str(),
        };
        Ok(self.api.post_json("/reviews", &body).await?)
    }

    async fn mark_reviewed(&self, order: &OrderId) -> Result<()> {
        let body = OrderPatch { is_reviewed: true };
        self.api
            .patch(&format!("/orders/{}", segment(order.as_str())), &body)
            .await?;
        Ok(())
    }

    async fn reviews_of_user(&self) -> Result<Value> {
        Ok(self.api.get_json("/reviews/user").await?)
    }

    async fn review_of_order(&self, order: &OrderId) -> Result<Value> {
        Ok(self
            .api
            .get_json(&format!("/reviews/order/{}", segment(order.as_str())))
            .await?)
    }
}

/// Read an order document, `None` when it is not one.
fn read_order(raw: Value, fallback_id: &str) -> Option<OrderRecord> {
    match serde_json::from_value::<OrderDto>(raw) {
        Ok(dto) if dto.id.is_some() || !fallback_id.is_empty() => {
            Some(conversions::convert_order(dto, fallback_id))
        }
        Ok(_) => {
            warn!("Skipping order without an id");
            None
        }
        Err(e) => {
            warn!(error = %e, "Skipping unreadable order");
            None
        }
    }
}

/// Read a review document, `None` when it is not a usable review.
fn read_review(raw: Value, order: Option<&OrderId>) -> Option<Review> {
    match serde_json::from_value::<ReviewDto>(raw) {
        Ok(dto) => conversions::convert_review(dto, order),
        Err(e) => {
            warn!(error = %e, "Skipping unreadable review");
            None
        }
    }
}

/// The current shopper's past orders and their reviews.
#[derive(Clone)]
pub struct OrderHistory {
    backend: Arc<dyn OrderBackend>,
    auth: Arc<dyn Authenticator>,
}

impl OrderHistory {
    #[must_use]
    pub fn new(backend: Arc<dyn OrderBackend>, auth: Arc<dyn Authenticator>) -> Self {
        Self { backend, auth }
    }

    /// All orders of the current shopper, newest as the backend sorts them.
    ///
    /// A response that is not a list reads as no orders; entries that do
    /// not parse, or carry no id, are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated` or the request failure.
    #[instrument(skip(self))]
    pub async fn list_orders(&self) -> Result<Vec<OrderRecord>> {
        let user = self.auth.current_user_id().await?;
        let raw = self.backend.orders_of(&user).await?;

        let Value::Array(items) = raw else {
            warn!("Order history response is not a list, treating as empty");
            return Ok(Vec::new());
        };

        let orders: Vec<OrderRecord> = items
            .into_iter()
            .filter_map(|item| read_order(item, ""))
            .collect();
        info!(count = orders.len(), "Loaded order history");
        Ok(orders)
    }

    /// One order by id.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, `Network(NotFound)` or the request failure.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn get_order(&self, id: &OrderId) -> Result<OrderRecord> {
        self.auth.current_user_id().await?;
        let raw = self.backend.order(id).await?;
        let dto: OrderDto = serde_json::from_value(raw).map_err(ApiError::Parse)?;
        Ok(conversions::convert_order(dto, id.as_str()))
    }

    /// Review an order and flag it as reviewed.
    ///
    /// The review stands once stored; a failure to set the flag afterwards
    /// is logged and the review still returned.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, or the failure to store the review.
    #[instrument(skip(self, comment), fields(order_id = %order_id, rating = rating.stars()))]
    pub async fn submit_review(
        &self,
        order_id: &OrderId,
        rating: Rating,
        comment: &str,
    ) -> Result<Review> {
        let user = self.auth.current_user_id().await?;
        let comment = comment.trim();
        let stored = self
            .backend
            .create_review(&user, order_id, rating, comment)
            .await?;

        if let Err(e) = self.backend.mark_reviewed(order_id).await {
            warn!(error = %e, "Review stored but order could not be flagged as reviewed");
        }
        info!("Order reviewed");

        Ok(read_review(stored, Some(order_id)).unwrap_or_else(|| Review {
            id: None,
            order_id: order_id.clone(),
            rating,
            comment: comment.to_string(),
            created_at: None,
        }))
    }

    /// Reviews written by the current shopper. Empty if they cannot be
    /// loaded.
    #[instrument(skip(self))]
    pub async fn reviews(&self) -> Vec<Review> {
        if !self.auth.is_authenticated().await {
            return Vec::new();
        }
        match self.backend.reviews_of_user().await {
            Ok(Value::Array(items)) => items
                .into_iter()
                .filter_map(|item| read_review(item, None))
                .collect(),
            Ok(_) => {
                warn!("Review list response is not a list, treating as empty");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Could not load reviews");
                Vec::new()
            }
        }
    }

    /// The review of one order, `None` if it has none or it cannot be
    /// loaded.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn review_for_order(&self, order_id: &OrderId) -> Option<Review> {
        match self.backend.review_of_order(order_id).await {
            Ok(Value::Null) => None,
            Ok(raw) => read_review(raw, Some(order_id)),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!(error = %e, "Could not load review");
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pethub_core::{Cart, CartLineItem, Discount, OrderStatus, Price, ProductId};
    use serde_json::json;

    use super::*;
    use crate::error::CartError;
    use crate::testing::{InMemoryAccount, StaticAuth};

    fn history(account: &Arc<InMemoryAccount>) -> OrderHistory {
        OrderHistory::new(
            Arc::clone(account) as Arc<dyn OrderBackend>,
            Arc::new(StaticAuth::user("u1")),
        )
    }

    fn stars(n: u8) -> Rating {
        Rating::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_non_list_history_reads_as_empty() {
        let account = Arc::new(InMemoryAccount::new());
        account
            .set_order_history("u1", json!({"message": "no orders"}))
            .await;
        assert!(history(&account).list_orders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_orders_are_skipped() {
        let account = Arc::new(InMemoryAccount::new());
        account
            .set_order_history(
                "u1",
                json!([
                    {"_id": "o1", "orderCode": "ORD-1", "status": "Shipped", "totalPrice": 370},
                    "o2",
                    {"orderCode": "no id"},
                    {"_id": "o3", "totalPrice": "not a number"},
                    {"_id": "o4", "isReviewed": true}
                ]),
            )
            .await;

        let orders = history(&account).list_orders().await.unwrap();
        let ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["o1", "o4"]);
        assert_eq!(orders[0].status, OrderStatus::Shipped);
        assert_eq!(orders[0].total, Price::from_whole(370));
        assert!(orders[1].is_reviewed);
    }

    #[tokio::test]
    async fn test_history_requires_a_session() {
        let account = Arc::new(InMemoryAccount::new());
        let history = OrderHistory::new(account, Arc::new(StaticAuth::anonymous()));
        assert!(matches!(
            history.list_orders().await,
            Err(CartError::Unauthenticated)
        ));
        assert!(history.reviews().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_order_by_id() {
        let account = Arc::new(InMemoryAccount::new());
        account
            .set_order_history("u1", json!([{"_id": "o9", "status": "Delivered"}]))
            .await;
        let history = history(&account);

        let order = history.get_order(&OrderId::new("o9")).await.unwrap();
        assert_eq!(order.status, OrderStatus::Delivered);
        assert_eq!(order.order_code, "ORDo9");

        let err = history.get_order(&OrderId::new("missing")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_submit_review_flags_order() {
        let account = Arc::new(InMemoryAccount::new());
        let history = history(&account);
        let order = OrderId::new("o1");

        let review = history
            .submit_review(&order, stars(4), "  Fast delivery ")
            .await
            .unwrap();
        assert_eq!(review.order_id, order);
        assert_eq!(review.rating, stars(4));
        assert_eq!(review.comment, "Fast delivery");
        assert!(review.id.is_some());
        assert_eq!(account.reviewed_orders().await, vec![order.clone()]);

        let fetched = history.review_for_order(&order).await.unwrap();
        assert_eq!(fetched.id, review.id);
        assert_eq!(history.reviews().await, vec![fetched]);
    }

    #[tokio::test]
    async fn test_review_survives_failed_flag_update() {
        let account = Arc::new(InMemoryAccount::new());
        account.fail_mark_reviewed(true).await;
        let history = history(&account);
        let order = OrderId::new("o1");

        let review = history.submit_review(&order, stars(5), "").await.unwrap();
        assert_eq!(review.rating, stars(5));
        assert!(account.reviewed_orders().await.is_empty());
        assert!(history.review_for_order(&order).await.is_some());
    }

    #[tokio::test]
    async fn test_missing_or_unreachable_review_is_none() {
        let account = Arc::new(InMemoryAccount::new());
        let history = history(&account);
        assert!(history.review_for_order(&OrderId::new("o1")).await.is_none());

        history
            .submit_review(&OrderId::new("o1"), stars(3), "ok")
            .await
            .unwrap();
        account.set_reviews_offline(true).await;
        assert!(history.review_for_order(&OrderId::new("o1")).await.is_none());
        assert!(history.reviews().await.is_empty());
    }

    #[tokio::test]
    async fn test_review_submission_failure_propagates() {
        let account = Arc::new(InMemoryAccount::new());
        account.set_reviews_offline(true).await;
        let err = history(&account)
            .submit_review(&OrderId::new("o1"), stars(2), "late")
            .await
            .unwrap_err();
        assert!(err.is_network());
        assert!(account.reviewed_orders().await.is_empty());
    }

    #[test]
    fn test_read_order_requires_an_id() {
        assert!(read_order(json!({"status": "Pending"}), "").is_none());
        let record = read_order(json!({"status": "Pending"}), "o7").unwrap();
        assert_eq!(record.id, OrderId::new("o7"));
        assert!(read_order(json!(42), "o7").is_none());
    }

    #[test]
    fn test_checkout_request_carries_totals_and_key() {
        let cart = Cart::new(vec![CartLineItem {
            product_id: ProductId::new("p1"),
            size: "M".to_string(),
            unit_price: Price::from_whole(150),
            quantity: 2,
        }]);
        let order = Order::from_cart(
            UserId::new("u1"),
            &cart,
            Price::from_whole(20),
            Discount::parse("10"),
        );

        let json = serde_json::to_value(checkout_request(&order)).unwrap();
        assert_eq!(json["subtotal"], serde_json::json!(300.0));
        assert_eq!(json["shipping"], serde_json::json!(20.0));
        assert_eq!(json["discount"], serde_json::json!(10.0));
        assert_eq!(json["items"][0]["quantity"], 2);
        assert_eq!(
            json["idempotencyKey"],
            serde_json::json!(order.idempotency_key.to_string())
        );
    }
}
