//! PetHub REST API client.
//!
//! # Architecture
//!
//! - One `reqwest` client per process with a fixed per-request timeout
//! - The bearer token is read from the shared [`Session`] on every request
//! - Raw wire DTOs live in [`types`]; [`conversions`] maps them to the
//!   `pethub-core` domain types so the rest of the crate never sees the
//!   backend's loosely-typed JSON
//!
//! # Endpoints used
//!
//! ```text
//! GET  /auth/profile                    - Current shopper profile
//! GET  /users/{id}                      - User record (cart, favorites, addresses)
//! POST /cart/create                     - Create a cart for a user
//! POST /cart/{userId}/add               - Add one unit of a line
//! POST /cart/{userId}/reduce            - Remove one unit, or the whole line
//! POST /cart/{userId}/checkout          - Submit an order
//! GET  /admin/products/{id}             - Product with options and stock
//! GET  /products/search                 - Search with filters
//! GET  /orders/user/{userId}            - Order history
//! GET  /orders/{id}                     - Single order
//! PATCH /orders/{id}                    - Mark an order as reviewed
//! POST /favorites/...                   - Favorites mutations
//! POST /addresses                       - Save an address
//! GET|PATCH|DELETE /addresses/{id}      - One address
//! POST /reviews                         - Review an order
//! GET  /reviews/user                    - Reviews by the current shopper
//! GET  /reviews/order/{orderId}         - Review of one order
//! ```

pub mod conversions;
pub mod types;

use std::sync::Arc;

use async_trait::async_trait;
use pethub_core::UserId;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::config::{StorefrontConfig, bearer};
use crate::error::CartError;
use crate::session::{Authenticator, Identity, Session};
use types::ProfileDto;

/// Backend error text that marks a unit as unavailable.
const OUT_OF_STOCK_MARKER: &str = "out of stock";

/// Errors that can occur when talking to the PetHub API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// The token was rejected.
    #[error("Unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend refused a cart unit for lack of stock.
    #[error("Out of stock: {0}")]
    OutOfStock(String),

    /// The user record names a cart without embedding its items.
    #[error("Cart {0} is not embedded in the user record")]
    CartNotEmbedded(String),

    /// A response parsed but lacks a field the client needs.
    #[error("Response is missing {0}")]
    MissingField(&'static str),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Client for the PetHub REST API.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    session: Session,
}

impl ApiClient {
    /// Create a new API client bound to a session.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StorefrontConfig, session: Session) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                session,
            }),
        })
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Absolute URL of an uploaded file.
    #[must_use]
    pub fn upload_url(&self, file_name: &str) -> String {
        format!(
            "{}/uploads/{}",
            self.inner.base_url.as_str().trim_end_matches('/'),
            file_name
        )
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.inner.session.token().await {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, bearer(&token)),
            None => request,
        }
    }

    /// Send a request and return the body text of a successful response.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = self.authorize(request).await.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = types::error_message(&body);
        tracing::debug!(status = %status, message = %message, "API returned non-success status");

        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            _ if message.to_lowercase().contains(OUT_OF_STOCK_MARKER) => {
                ApiError::OutOfStock(message)
            }
            _ => ApiError::Status {
                status: status.as_u16(),
                message,
            },
        })
    }

    fn parse<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
        serde_json::from_str(body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    /// GET a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body does not parse.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path)?;
        let body = self.send(self.inner.client.get(url)).await?;
        Self::parse(&body)
    }

    /// GET a JSON resource with query parameters.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body does not parse.
    pub async fn get_json_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized + Sync,
    {
        let url = self.url(path)?;
        let body = self.send(self.inner.client.get(url).query(query)).await?;
        Self::parse(&body)
    }

    /// POST a JSON body and parse the JSON response.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body does not parse.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let text = self.send(self.inner.client.post(url).json(body)).await?;
        Self::parse(&text)
    }

    /// POST a JSON body, ignoring the response body.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn post<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path)?;
        self.send(self.inner.client.post(url).json(body)).await?;
        Ok(())
    }

    /// PATCH a JSON body and parse the JSON response.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the body does not parse.
    pub async fn patch_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let text = self.send(self.inner.client.patch(url).json(body)).await?;
        Self::parse(&text)
    }

    /// PATCH a JSON body, ignoring the response body.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn patch<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path)?;
        self.send(self.inner.client.patch(url).json(body)).await?;
        Ok(())
    }

    /// DELETE with a JSON body, ignoring the response body.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails.
    pub async fn delete<B>(&self, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(path)?;
        self.send(self.inner.client.delete(url).json(body)).await?;
        Ok(())
    }

    /// Fetch the profile behind the current token.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the token is rejected.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<ProfileDto, ApiError> {
        self.get_json("/auth/profile").await
    }
}

#[async_trait]
impl Authenticator for ApiClient {
    async fn is_authenticated(&self) -> bool {
        self.inner.session.is_authenticated().await
    }

    async fn current_user_id(&self) -> Result<UserId, CartError> {
        let session = &self.inner.session;
        if !session.is_authenticated().await {
            return Err(CartError::Unauthenticated);
        }
        if let Some(identity) = session.identity().await {
            return Ok(identity.user_id);
        }

        match self.profile().await {
            Ok(profile) => {
                debug!(user_id = %profile.id, "Resolved shopper profile");
                let identity = Identity {
                    user_id: profile.id.clone(),
                    display_name: profile.display_name,
                    favorites: None,
                };
                session.set_identity(identity).await;
                Ok(profile.id)
            }
            Err(ApiError::Unauthorized) => {
                tracing::warn!("Token rejected by profile endpoint, logging out");
                session.logout().await;
                Err(CartError::Unauthenticated)
            }
            Err(e) => Err(CartError::Network(e)),
        }
    }
}

/// Percent-encode a value for use as a single path segment.
pub(crate) fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}
