//! Integration tests for the PetHub storefront client.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pethub-integration-tests
//! ```
//!
//! Scenarios run the real cart services against the in-memory backend
//! from `pethub_storefront::testing`, so no server is needed.

use std::sync::Arc;

use pethub_core::Price;
use pethub_storefront::cart::{CartService, LocalCartStore, RemoteCart};
use pethub_storefront::session::Authenticator;
use pethub_storefront::testing::{InMemoryBackend, StaticAuth};

/// Flat shipping fee used by every scenario.
pub const SHIPPING: i64 = 20;

/// A cart service wired to an in-memory backend and a given local store.
pub struct TestContext {
    pub backend: Arc<InMemoryBackend>,
    pub local: Arc<dyn LocalCartStore>,
    pub cart: CartService,
}

impl TestContext {
    /// Wire a logged-in shopper `u1`.
    #[must_use]
    pub fn new(backend: InMemoryBackend, local: Arc<dyn LocalCartStore>) -> Self {
        Self::with_auth(backend, local, Arc::new(StaticAuth::user("u1")), false)
    }

    #[must_use]
    pub fn with_auth(
        backend: InMemoryBackend,
        local: Arc<dyn LocalCartStore>,
        auth: Arc<dyn Authenticator>,
        retain_failed_sync: bool,
    ) -> Self {
        let backend = Arc::new(backend);
        let remote = RemoteCart::new(backend.clone(), backend.clone(), auth);
        let cart = CartService::new(
            remote,
            Arc::clone(&local),
            backend.clone(),
            Price::from_whole(SHIPPING),
            retain_failed_sync,
        );
        Self {
            backend,
            local,
            cart,
        }
    }
}
