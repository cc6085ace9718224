//! Shopper favorites.
//!
//! The favorites list id comes from the user record and is cached on the
//! [`Session`] next to the user id. Mutations try the user-scoped endpoint
//! first and fall back to the list-scoped ones that older backend
//! deployments expose.

use std::sync::Arc;

use async_trait::async_trait;
use pethub_core::{FavoriteListId, ProductId, UserId};
use tracing::{debug, instrument, warn};

use crate::api::types::{FavoriteRequest, FavoritesDto, UserDto};
use crate::api::{ApiClient, ApiError, conversions, segment};
use crate::error::{CartError, Result};
use crate::session::{Authenticator, Session};

/// Favorites endpoints of the backend.
///
/// Each mutation has a user-scoped route and list-scoped fallbacks;
/// [`FavoritesService`] decides the order they are tried in.
#[async_trait]
pub trait FavoritesBackend: Send + Sync {
    /// Favorites list id recorded on the user, if the user has one.
    async fn list_id(&self, user: &UserId) -> Result<Option<FavoriteListId>>;

    /// Product ids held in a list.
    async fn items(&self, list: &FavoriteListId) -> Result<Vec<ProductId>>;

    async fn add_for_user(&self, user: &UserId, product: &ProductId) -> Result<()>;

    async fn add_to_list(
        &self,
        list: &FavoriteListId,
        user: &UserId,
        product: &ProductId,
    ) -> Result<()>;

    async fn remove_for_user(&self, user: &UserId, product: &ProductId) -> Result<()>;

    async fn remove_from_list(
        &self,
        list: &FavoriteListId,
        user: &UserId,
        product: &ProductId,
    ) -> Result<()>;

    /// Remove a product from a list without the owner check.
    async fn force_remove(&self, list: &FavoriteListId, product: &ProductId) -> Result<()>;
}

/// Favorites list id named by a user record, populated or not.
fn list_id_of(record: &UserDto) -> Option<FavoriteListId> {
    record
        .favorites
        .as_ref()
        .map(|f| f.id())
        .filter(|id| !id.is_empty())
        .map(FavoriteListId::new)
}

/// Product ids of a favorites document, skipping items with no usable id.
fn product_ids(dto: &FavoritesDto) -> Vec<ProductId> {
    dto.items
        .iter()
        .filter_map(conversions::favorite_product_id)
        .collect()
}

/// [`FavoritesBackend`] over the PetHub REST API.
#[derive(Clone)]
pub struct HttpFavorites {
    api: ApiClient,
}

impl HttpFavorites {
    #[must_use]
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    async fn post(&self, path: &str, product: &ProductId, user: Option<&UserId>) -> Result<()> {
        let body = FavoriteRequest {
            product_id: product.as_str(),
            user_id: user.map(UserId::as_str),
        };
        self.api.post(path, &body).await?;
        Ok(())
    }
}

#[async_trait]
impl FavoritesBackend for HttpFavorites {
    async fn list_id(&self, user: &UserId) -> Result<Option<FavoriteListId>> {
        let record: UserDto = self
            .api
            .get_json(&format!("/users/{}", segment(user.as_str())))
            .await?;
        Ok(list_id_of(&record))
    }

    async fn items(&self, list: &FavoriteListId) -> Result<Vec<ProductId>> {
        let dto: FavoritesDto = self
            .api
            .get_json(&format!("/favorites/{}", segment(list.as_str())))
            .await?;
        Ok(product_ids(&dto))
    }

    async fn add_for_user(&self, user: &UserId, product: &ProductId) -> Result<()> {
        let path = format!("/favorites/user/{}/add", segment(user.as_str()));
        self.post(&path, product, None).await
    }

    async fn add_to_list(
        &self,
        list: &FavoriteListId,
        user: &UserId,
        product: &ProductId,
    ) -> Result<()> {
        let path = format!("/favorites/{}/add", segment(list.as_str()));
        self.post(&path, product, Some(user)).await
    }

    async fn remove_for_user(&self, user: &UserId, product: &ProductId) -> Result<()> {
        let path = format!("/favorites/user/{}/remove", segment(user.as_str()));
        self.post(&path, product, None).await
    }

    async fn remove_from_list(
        &self,
        list: &FavoriteListId,
        user: &UserId,
        product: &ProductId,
    ) -> Result<()> {
        let path = format!("/favorites/{}/remove", segment(list.as_str()));
        self.post(&path, product, Some(user)).await
    }

    async fn force_remove(&self, list: &FavoriteListId, product: &ProductId) -> Result<()> {
        let path = format!("/favorites/{}/force-remove", segment(list.as_str()));
        self.post(&path, product, None).await
    }
}

/// Favorites operations for the current shopper.
#[derive(Clone)]
pub struct FavoritesService {
    backend: Arc<dyn FavoritesBackend>,
    auth: Arc<dyn Authenticator>,
    session: Session,
}

impl FavoritesService {
    #[must_use]
    pub fn new(
        backend: Arc<dyn FavoritesBackend>,
        auth: Arc<dyn Authenticator>,
        session: Session,
    ) -> Self {
        Self {
            backend,
            auth,
            session,
        }
    }

    /// User id and favorites list id, resolving the latter once per session.
    async fn ids(&self) -> Result<(UserId, FavoriteListId)> {
        let user = self.auth.current_user_id().await?;
        if let Some(favorites) = self.session.identity().await.and_then(|i| i.favorites) {
            return Ok((user, favorites));
        }

        let favorites = self.backend.list_id(&user).await?.ok_or_else(|| {
            CartError::Network(ApiError::NotFound(format!("favorites of user {user}")))
        })?;

        debug!(favorites = %favorites, "Resolved favorites list");
        self.session.set_favorites(favorites.clone()).await;
        Ok((user, favorites))
    }

    /// Product ids in the favorites list. Empty if it cannot be loaded.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Vec<ProductId> {
        match self.fetch().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "Could not load favorites");
                Vec::new()
            }
        }
    }

    async fn fetch(&self) -> Result<Vec<ProductId>> {
        let (_, favorites) = self.ids().await?;
        self.backend.items(&favorites).await
    }

    /// Whether a product is a favorite. `false` if the list cannot be loaded.
    pub async fn contains(&self, product_id: &ProductId) -> bool {
        self.list().await.iter().any(|p| p == product_id)
    }

    /// Add a product to the favorites.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, or the failure of the last endpoint tried.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add(&self, product_id: &ProductId) -> Result<()> {
        let (user, favorites) = self.ids().await?;
        let Err(e) = self.backend.add_for_user(&user, product_id).await else {
            return Ok(());
        };

        warn!(error = %e, "User-scoped favorites endpoint failed, trying list endpoint");
        self.backend
            .add_to_list(&favorites, &user, product_id)
            .await
    }

    /// Remove a product from the favorites.
    ///
    /// On failure the cached favorites list id is dropped so the next call
    /// resolves it again.
    ///
    /// # Errors
    ///
    /// Returns `Unauthenticated`, or the failure of the last endpoint tried.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<()> {
        let result = self.try_remove(product_id).await;
        if result.is_err() {
            self.session.clear_favorites().await;
        }
        result
    }

    async fn try_remove(&self, product_id: &ProductId) -> Result<()> {
        let (user, favorites) = self.ids().await?;

        let Err(e) = self.backend.remove_for_user(&user, product_id).await else {
            return Ok(());
        };
        warn!(error = %e, "User-scoped favorites endpoint failed, trying list endpoint");

        let Err(e) = self
            .backend
            .remove_from_list(&favorites, &user, product_id)
            .await
        else {
            return Ok(());
        };
        warn!(error = %e, "List favorites endpoint failed, forcing removal");

        self.backend.force_remove(&favorites, product_id).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::session::Identity;
    use crate::testing::{FavoriteCall, FavoriteRoute, InMemoryAccount, StaticAuth};

    fn product(id: &str) -> ProductId {
        ProductId::new(id)
    }

    async fn service(account: &Arc<InMemoryAccount>) -> (FavoritesService, Session) {
        let session = Session::new(Some(SecretString::from("tok")));
        session.set_identity(Identity::new(UserId::new("u1"))).await;
        let favorites = FavoritesService::new(
            Arc::clone(account) as Arc<dyn FavoritesBackend>,
            Arc::new(StaticAuth::user("u1")),
            session.clone(),
        );
        (favorites, session)
    }

    fn account() -> Arc<InMemoryAccount> {
        Arc::new(InMemoryAccount::new().with_favorites("u1", "f1", &["p1"]))
    }

    #[tokio::test]
    async fn test_anonymous_list_is_empty() {
        let favorites = FavoritesService::new(
            account(),
            Arc::new(StaticAuth::anonymous()),
            Session::default(),
        );
        assert!(favorites.list().await.is_empty());
        assert!(!favorites.contains(&product("p1")).await);
    }

    #[tokio::test]
    async fn test_anonymous_mutations_are_unauthenticated() {
        let account = account();
        let favorites = FavoritesService::new(
            Arc::clone(&account) as Arc<dyn FavoritesBackend>,
            Arc::new(StaticAuth::anonymous()),
            Session::default(),
        );
        assert!(matches!(
            favorites.add(&product("p2")).await,
            Err(CartError::Unauthenticated)
        ));
        assert!(matches!(
            favorites.remove(&product("p1")).await,
            Err(CartError::Unauthenticated)
        ));
        assert!(account.favorite_calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_list_id_is_resolved_once_per_session() {
        let account = account();
        let (favorites, session) = service(&account).await;

        assert!(favorites.contains(&product("p1")).await);
        assert!(!favorites.contains(&product("p9")).await);
        assert_eq!(
            session.identity().await.unwrap().favorites,
            Some(FavoriteListId::new("f1"))
        );

        let resolutions = account
            .favorite_calls()
            .await
            .into_iter()
            .filter(|c| *c == FavoriteCall::ResolveList)
            .count();
        assert_eq!(resolutions, 1);
    }

    #[tokio::test]
    async fn test_user_without_list_reads_as_empty() {
        let account = Arc::new(InMemoryAccount::new());
        let (favorites, _) = service(&account).await;
        assert!(favorites.list().await.is_empty());
        assert!(favorites.add(&product("p1")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_add_falls_back_to_list_endpoint() {
        let account = account();
        account.fail_favorite_route(FavoriteRoute::User).await;
        let (favorites, _) = service(&account).await;

        favorites.add(&product("p2")).await.unwrap();

        assert_eq!(
            account.favorite_calls().await,
            vec![
                FavoriteCall::ResolveList,
                FavoriteCall::Add(FavoriteRoute::User),
                FavoriteCall::Add(FavoriteRoute::List),
            ]
        );
        assert_eq!(
            account.favorite_items("f1").await,
            vec![product("p1"), product("p2")]
        );
    }

    #[tokio::test]
    async fn test_add_stops_at_first_working_endpoint() {
        let account = account();
        let (favorites, _) = service(&account).await;

        favorites.add(&product("p2")).await.unwrap();
        assert_eq!(
            account.favorite_calls().await,
            vec![FavoriteCall::ResolveList, FavoriteCall::Add(FavoriteRoute::User)]
        );
    }

    #[tokio::test]
    async fn test_remove_tries_user_then_list_then_force() {
        let account = account();
        account.fail_favorite_route(FavoriteRoute::User).await;
        account.fail_favorite_route(FavoriteRoute::List).await;
        let (favorites, session) = service(&account).await;

        favorites.remove(&product("p1")).await.unwrap();

        assert_eq!(
            account.favorite_calls().await,
            vec![
                FavoriteCall::ResolveList,
                FavoriteCall::Remove(FavoriteRoute::User),
                FavoriteCall::Remove(FavoriteRoute::List),
                FavoriteCall::Remove(FavoriteRoute::Force),
            ]
        );
        assert!(account.favorite_items("f1").await.is_empty());
        // Success keeps the cached list id.
        assert!(session.identity().await.unwrap().favorites.is_some());
    }

    #[tokio::test]
    async fn test_failed_remove_drops_cached_list_id() {
        let account = account();
        account.fail_favorite_route(FavoriteRoute::User).await;
        account.fail_favorite_route(FavoriteRoute::List).await;
        account.fail_favorite_route(FavoriteRoute::Force).await;
        let (favorites, session) = service(&account).await;

        assert!(favorites.remove(&product("p1")).await.is_err());
        assert_eq!(session.identity().await.unwrap().favorites, None);

        // The next call resolves the list id again.
        account.clear_favorite_calls().await;
        favorites.list().await;
        assert_eq!(
            account.favorite_calls().await.first(),
            Some(&FavoriteCall::ResolveList)
        );
    }

    #[test]
    fn test_list_id_from_bare_or_populated_reference() {
        let record: UserDto = serde_json::from_value(json!({"favorites": "f1"})).unwrap();
        assert_eq!(list_id_of(&record), Some(FavoriteListId::new("f1")));

        let record: UserDto =
            serde_json::from_value(json!({"favorites": {"_id": "f2", "items": []}})).unwrap();
        assert_eq!(list_id_of(&record), Some(FavoriteListId::new("f2")));

        let record: UserDto = serde_json::from_value(json!({"favorites": ""})).unwrap();
        assert_eq!(list_id_of(&record), None);

        let record: UserDto = serde_json::from_value(json!({})).unwrap();
        assert_eq!(list_id_of(&record), None);
    }

    #[test]
    fn test_product_ids_accept_bare_and_populated_items() {
        let dto: FavoritesDto = serde_json::from_value(json!({"items": [
            "p1",
            {"_id": "p2", "name": "Bed"},
            {"productId": "p3"},
            {"productId": {"id": "p4"}},
            null
        ]}))
        .unwrap();
        assert_eq!(
            product_ids(&dto),
            vec![product("p1"), product("p2"), product("p3"), product("p4")]
        );
    }

    #[test]
    fn test_legacy_request_carries_user_id() {
        let body = FavoriteRequest {
            product_id: "p1",
            user_id: Some("u1"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, json!({"productId": "p1", "userId": "u1"}));

        let body = FavoriteRequest {
            product_id: "p1",
            user_id: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, json!({"productId": "p1"}));
    }
}
