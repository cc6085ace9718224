//! Storefront handle wiring the services to one shopper session.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use secrecy::SecretString;
use tracing::{info, instrument, warn};

use crate::addresses::{AddressBook, HttpAddresses};
use crate::api::{ApiClient, ApiError};
use crate::cart::{CartService, FileCartStore, HttpCartBackend, LocalCartStore, RemoteCart, SyncReport};
use crate::catalog::HttpCatalog;
use crate::config::StorefrontConfig;
use crate::error::Result;
use crate::favorites::{FavoritesService, HttpFavorites};
use crate::orders::{HttpFulfillment, HttpOrders, OrderHistory};
use crate::session::{Authenticator, Session};

/// Storefront services sharing one session.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    session: Session,
    api: ApiClient,
    catalog: HttpCatalog,
    cart: CartService,
    favorites: FavoritesService,
    orders: OrderHistory,
    addresses: AddressBook,
    synced: AtomicBool,
}

impl Storefront {
    /// Build the services from configuration, using the file-backed cart
    /// cache under `config.cache_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> std::result::Result<Self, ApiError> {
        let local = Arc::new(FileCartStore::new(&config.cache_dir));
        Self::with_local_store(config, local)
    }

    /// Build the services with a caller-supplied local cart cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_local_store(
        config: StorefrontConfig,
        local: Arc<dyn LocalCartStore>,
    ) -> std::result::Result<Self, ApiError> {
        let session = Session::new(config.auth_token.clone());
        let api = ApiClient::new(&config, session.clone())?;
        let catalog = HttpCatalog::new(api.clone());

        let remote = RemoteCart::new(
            Arc::new(HttpCartBackend::new(api.clone())),
            Arc::new(catalog.clone()),
            Arc::new(api.clone()),
        );
        let cart = CartService::new(
            remote,
            local,
            Arc::new(HttpFulfillment::new(api.clone())),
            config.shipping_fee,
            config.retain_failed_sync,
        );

        let auth: Arc<dyn Authenticator> = Arc::new(api.clone());
        let favorites = FavoritesService::new(
            Arc::new(HttpFavorites::new(api.clone())),
            Arc::clone(&auth),
            session.clone(),
        );
        let orders = OrderHistory::new(Arc::new(HttpOrders::new(api.clone())), Arc::clone(&auth));
        let addresses = AddressBook::new(Arc::new(HttpAddresses::new(api.clone())), auth);

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                favorites,
                orders,
                addresses,
                config,
                session,
                api,
                catalog,
                cart,
                synced: AtomicBool::new(false),
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    #[must_use]
    pub fn catalog(&self) -> &HttpCatalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn favorites(&self) -> &FavoritesService {
        &self.inner.favorites
    }

    #[must_use]
    pub fn orders(&self) -> &OrderHistory {
        &self.inner.orders
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressBook {
        &self.inner.addresses
    }

    /// Run the session-start sync, once per login.
    ///
    /// Returns `None` when there is no session or the sync already ran.
    ///
    /// # Errors
    ///
    /// Returns the sync failure; the next call will try again.
    #[instrument(skip(self))]
    pub async fn start_session(&self) -> Result<Option<SyncReport>> {
        if !self.inner.api.is_authenticated().await {
            return Ok(None);
        }
        if self.inner.synced.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }

        match self.inner.cart.sync().await {
            Ok(report) => {
                if let SyncReport::PartialFailure(failed) = &report {
                    warn!(failed = failed.len(), "Some cached cart items could not be synced");
                }
                Ok(Some(report))
            }
            Err(e) => {
                self.inner.synced.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Log in with a new token and run the session-start sync.
    ///
    /// # Errors
    ///
    /// Returns the sync failure. The login itself always takes effect.
    pub async fn login(&self, token: SecretString) -> Result<Option<SyncReport>> {
        self.inner.session.login(token).await;
        self.inner.synced.store(false, Ordering::SeqCst);
        let user = self.inner.api.current_user_id().await?;
        info!(user_id = %user, "Logged in");
        self.start_session().await
    }

    /// Forget the token and every cached identity field.
    pub async fn logout(&self) {
        self.inner.session.logout().await;
        self.inner.synced.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::MemoryCartStore;

    fn anonymous() -> Storefront {
        Storefront::with_local_store(
            StorefrontConfig::default(),
            Arc::new(MemoryCartStore::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_start_session_without_token_does_nothing() {
        let storefront = anonymous();
        assert!(storefront.start_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_services_share_the_session() {
        let storefront = anonymous();
        storefront
            .session()
            .login(SecretString::from("tok"))
            .await;
        assert!(storefront.api().session().is_authenticated().await);

        storefront.logout().await;
        assert!(!storefront.api().session().is_authenticated().await);
    }

    #[tokio::test]
    async fn test_account_services_refuse_anonymous_shopper() {
        let storefront = anonymous();
        assert!(matches!(
            storefront.addresses().addresses().await,
            Err(crate::CartError::Unauthenticated)
        ));
        assert!(matches!(
            storefront.orders().list_orders().await,
            Err(crate::CartError::Unauthenticated)
        ));
        assert!(storefront.orders().reviews().await.is_empty());
        assert!(storefront.favorites().list().await.is_empty());
    }
}
