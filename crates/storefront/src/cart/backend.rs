//! Unit-level cart primitives exposed by the backend.
//!
//! The REST API only knows how to add or remove one unit at a time, or
//! drop a whole line. Everything quantity-shaped is built on top of these
//! in [`super::RemoteCart`].

use async_trait::async_trait;
use pethub_core::{LineKey, UserId};
use tracing::{debug, instrument};

use crate::api::types::{AddItemRequest, CartRef, CreateCartRequest, ReduceItemRequest, UserDto};
use crate::api::{ApiClient, ApiError, conversions, segment};
use crate::error::CartError;

/// A line as the backend stores it: key and quantity, no price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLine {
    pub key: LineKey,
    pub quantity: u32,
}

/// Cart primitives of the remote source of truth.
#[async_trait]
pub trait CartBackend: Send + Sync {
    /// Create the user's cart if the user record has none.
    async fn ensure_cart(&self, user: &UserId) -> Result<(), CartError>;

    /// Add one unit of a line.
    async fn add_unit(&self, user: &UserId, key: &LineKey) -> Result<(), CartError>;

    /// Remove one unit of a line.
    async fn reduce_unit(&self, user: &UserId, key: &LineKey) -> Result<(), CartError>;

    /// Remove a line entirely.
    async fn remove_line(&self, user: &UserId, key: &LineKey) -> Result<(), CartError>;

    /// Current lines, or `None` when the user has no cart yet.
    async fn read_lines(&self, user: &UserId) -> Result<Option<Vec<RemoteLine>>, CartError>;
}

/// [`CartBackend`] over the PetHub REST API.
#[derive(Clone)]
pub struct HttpCartBackend {
    api: ApiClient,
}

impl HttpCartBackend {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn user_record(&self, user: &UserId) -> Result<UserDto, ApiError> {
        self.api
            .get_json(&format!("/users/{}", segment(user.as_str())))
            .await
    }

    async fn reduce(&self, user: &UserId, key: &LineKey, remove_all: bool) -> Result<(), CartError> {
        let body = ReduceItemRequest {
            product_id: key.product_id.as_str(),
            size: &key.size,
            remove_all,
        };
        self.api
            .post(&format!("/cart/{}/reduce", segment(user.as_str())), &body)
            .await
            .map_err(|e| unit_error(e, key))
    }
}

/// Map a unit-mutation failure, naming the line for stock rejections.
fn unit_error(err: ApiError, key: &LineKey) -> CartError {
    match err {
        ApiError::OutOfStock(_) => CartError::OutOfStock(key.clone()),
        other => {
            tracing::error!(key = %key, error = %other, "Cart mutation failed");
            CartError::from(other)
        }
    }
}

#[async_trait]
impl CartBackend for HttpCartBackend {
    #[instrument(skip(self), fields(user_id = %user))]
    async fn ensure_cart(&self, user: &UserId) -> Result<(), CartError> {
        let record = self.user_record(user).await?;
        if record.cart.is_some() {
            return Ok(());
        }

        debug!("User has no cart, creating one");
        let body = CreateCartRequest {
            user_id: user.as_str(),
        };
        self.api.post("/cart/create", &body).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user, key = %key))]
    async fn add_unit(&self, user: &UserId, key: &LineKey) -> Result<(), CartError> {
        let body = AddItemRequest {
            product_id: key.product_id.as_str(),
            size: &key.size,
        };
        self.api
            .post(&format!("/cart/{}/add", segment(user.as_str())), &body)
            .await
            .map_err(|e| unit_error(e, key))
    }

    #[instrument(skip(self), fields(user_id = %user, key = %key))]
    async fn reduce_unit(&self, user: &UserId, key: &LineKey) -> Result<(), CartError> {
        self.reduce(user, key, false).await
    }

    #[instrument(skip(self), fields(user_id = %user, key = %key))]
    async fn remove_line(&self, user: &UserId, key: &LineKey) -> Result<(), CartError> {
        self.reduce(user, key, true).await
    }

    #[instrument(skip(self), fields(user_id = %user))]
    async fn read_lines(&self, user: &UserId) -> Result<Option<Vec<RemoteLine>>, CartError> {
        let record = self.user_record(user).await?;
        match record.cart {
            None => Ok(None),
            Some(CartRef::Id(id)) => Err(CartError::Network(ApiError::CartNotEmbedded(id))),
            Some(CartRef::Embedded(cart)) => Ok(Some(conversions::convert_cart_lines(cart))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_stock_names_the_line() {
        let key = LineKey::new("p1", "M");
        let err = unit_error(ApiError::OutOfStock("Out of stock".to_string()), &key);
        assert!(matches!(err, CartError::OutOfStock(k) if k == key));
    }

    #[test]
    fn test_rejected_token_is_unauthenticated() {
        let err = unit_error(ApiError::Unauthorized, &LineKey::new("p1", "M"));
        assert!(matches!(err, CartError::Unauthenticated));
    }

    #[test]
    fn test_other_failures_are_network_errors() {
        let err = unit_error(
            ApiError::Status {
                status: 500,
                message: "boom".to_string(),
            },
            &LineKey::new("p1", "M"),
        );
        assert!(err.is_network());
    }
}
