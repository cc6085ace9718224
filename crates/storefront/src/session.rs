//! Shopper session state.
//!
//! Holds the bearer token and the identity resolved from it. The identity
//! (user id and favorites list id) is fetched once and cached here until
//! [`Session::logout`] or [`Session::login`] invalidates it, so every
//! service sharing a `Session` sees the same user.

use std::sync::Arc;

use async_trait::async_trait;
use pethub_core::{FavoriteListId, UserId};
use secrecy::SecretString;
use tokio::sync::RwLock;

use crate::error::CartError;

/// Identity resolved from the auth profile endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub display_name: Option<String>,
    /// Favorites list id, resolved lazily from the user record.
    pub favorites: Option<FavoriteListId>,
}

impl Identity {
    #[must_use]
    pub const fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            display_name: None,
            favorites: None,
        }
    }
}

/// Session-scoped authentication state.
///
/// Cheaply cloneable; clones share state.
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Default)]
struct SessionInner {
    token: RwLock<Option<SecretString>>,
    identity: RwLock<Option<Identity>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session, optionally already logged in.
    #[must_use]
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                token: RwLock::new(token),
                identity: RwLock::new(None),
            }),
        }
    }

    /// Store a new token and drop any identity cached for the previous one.
    pub async fn login(&self, token: SecretString) {
        *self.inner.token.write().await = Some(token);
        *self.inner.identity.write().await = None;
    }

    /// Forget the token and every cached identity field.
    pub async fn logout(&self) {
        *self.inner.token.write().await = None;
        *self.inner.identity.write().await = None;
        tracing::info!("Session logged out");
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.token.read().await.is_some()
    }

    pub async fn token(&self) -> Option<SecretString> {
        self.inner.token.read().await.clone()
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.inner.identity.read().await.clone()
    }

    pub async fn set_identity(&self, identity: Identity) {
        *self.inner.identity.write().await = Some(identity);
    }

    /// Cache the favorites list id on the current identity.
    ///
    /// Ignored when no identity is cached.
    pub async fn set_favorites(&self, favorites: FavoriteListId) {
        if let Some(identity) = self.inner.identity.write().await.as_mut() {
            identity.favorites = Some(favorites);
        }
    }

    /// Drop a cached favorites list id so the next call re-resolves it.
    pub async fn clear_favorites(&self) {
        if let Some(identity) = self.inner.identity.write().await.as_mut() {
            identity.favorites = None;
        }
    }
}

/// Resolves who the current shopper is.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Whether a token is present. Does not contact the backend.
    async fn is_authenticated(&self) -> bool;

    /// The current user's id.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unauthenticated` when there is no session, or a
    /// network error when the profile cannot be fetched.
    async fn current_user_id(&self) -> Result<UserId, CartError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_session_without_token_is_anonymous() {
        let session = Session::default();
        assert!(!session.is_authenticated().await);
        assert!(session.identity().await.is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_identity() {
        let session = Session::new(Some(SecretString::from("tok")));
        session.set_identity(Identity::new(UserId::new("u1"))).await;
        session.set_favorites(FavoriteListId::new("f1")).await;

        let cached = session.identity().await.unwrap();
        assert_eq!(cached.favorites, Some(FavoriteListId::new("f1")));

        session.logout().await;
        assert!(!session.is_authenticated().await);
        assert!(session.identity().await.is_none());
    }

    #[tokio::test]
    async fn test_login_invalidates_previous_identity() {
        let session = Session::new(Some(SecretString::from("old")));
        session.set_identity(Identity::new(UserId::new("u1"))).await;

        session.login(SecretString::from("new")).await;
        assert!(session.is_authenticated().await);
        assert!(session.identity().await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let session = Session::new(Some(SecretString::from("tok")));
        let other = session.clone();
        other.logout().await;
        assert!(!session.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_set_favorites_without_identity_is_ignored() {
        let session = Session::new(Some(SecretString::from("tok")));
        session.set_favorites(FavoriteListId::new("f1")).await;
        assert!(session.identity().await.is_none());
    }
}
