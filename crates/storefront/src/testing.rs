//! In-memory collaborators for tests.
//!
//! [`InMemoryBackend`] plays the catalog, the cart backend and order
//! fulfillment at once, enforcing stock on unit additions the way the real
//! backend does. It counts calls and can be told to fail, so tests can
//! assert on what was (or was not) contacted.
//!
//! [`InMemoryAccount`] does the same for the per-shopper endpoints:
//! favorites, order history with reviews, and the address book.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use pethub_core::{
    Address, AddressDraft, AddressId, FavoriteListId, LineKey, Order, OrderId, OrderRecord,
    OrderStatus, Price, Product, ProductId, ProductOption, Rating, SearchFilters, UserId,
};
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::addresses::AddressBackend;
use crate::api::ApiError;
use crate::cart::{CartBackend, OrderFulfillment, RemoteLine};
use crate::catalog::ProductCatalog;
use crate::error::CartError;
use crate::favorites::FavoritesBackend;
use crate::orders::OrderBackend;
use crate::session::Authenticator;

#[derive(Default)]
struct State {
    products: Vec<Product>,
    carts: HashMap<UserId, Vec<RemoteLine>>,
    orders: Vec<(Order, OrderRecord)>,
    calls: u32,
    unit_calls: u32,
    /// Unit mutations left before they start failing.
    fail_after: Option<u32>,
    offline: bool,
    catalog_offline: bool,
    fail_removals: bool,
}

impl State {
    fn enter(&mut self) -> Result<(), CartError> {
        self.calls += 1;
        if self.offline {
            return Err(offline());
        }
        Ok(())
    }

    fn enter_catalog(&mut self) -> Result<(), CartError> {
        self.enter()?;
        if self.catalog_offline {
            return Err(offline());
        }
        Ok(())
    }

    fn enter_unit(&mut self) -> Result<(), CartError> {
        self.enter()?;
        self.unit_calls += 1;
        match self.fail_after {
            Some(0) => Err(offline()),
            Some(n) => {
                self.fail_after = Some(n - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn product(&self, id: &ProductId) -> Result<&Product, CartError> {
        self.products
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| CartError::Network(ApiError::NotFound(id.to_string())))
    }

    fn cart_mut(&mut self, user: &UserId) -> Result<&mut Vec<RemoteLine>, CartError> {
        self.carts
            .get_mut(user)
            .ok_or_else(|| CartError::Network(ApiError::NotFound(format!("cart of {user}"))))
    }
}

fn offline() -> CartError {
    CartError::Network(ApiError::Status {
        status: 503,
        message: "backend unavailable".to_string(),
    })
}

/// Catalog, cart backend and fulfillment held in memory.
#[derive(Default)]
pub struct InMemoryBackend {
    state: Mutex<State>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a product with `(size, price, stock)` options. The product is
    /// named after its id.
    #[must_use]
    pub fn with_product(self, id: &str, options: &[(&str, i64, u32)]) -> Self {
        self.with_catalog_product(Product {
            id: ProductId::new(id),
            name: id.to_string(),
            description: String::new(),
            image: None,
            category: None,
            animal_type: None,
            options: options
                .iter()
                .map(|(size, price, stock)| ProductOption {
                    size: (*size).to_string(),
                    price: Price::from_whole(*price),
                    stock: *stock,
                })
                .collect(),
        })
    }

    #[must_use]
    pub fn with_catalog_product(mut self, product: Product) -> Self {
        self.state.get_mut().products.push(product);
        self
    }

    /// Put units of a line directly into a user's cart, creating it.
    pub async fn seed_line(&self, user: &str, product: &str, size: &str, quantity: u32) {
        let mut state = self.state.lock().await;
        let lines = state.carts.entry(UserId::new(user)).or_default();
        let key = LineKey::new(product, size);
        match lines.iter_mut().find(|l| l.key == key) {
            Some(line) => line.quantity += quantity,
            None => lines.push(RemoteLine { key, quantity }),
        }
    }

    /// Units of a line held in a user's cart.
    pub async fn quantity(&self, user: &str, product: &str, size: &str) -> u32 {
        let key = LineKey::new(product, size);
        self.state
            .lock()
            .await
            .carts
            .get(&UserId::new(user))
            .and_then(|lines| lines.iter().find(|l| l.key == key))
            .map_or(0, |l| l.quantity)
    }

    pub async fn has_cart(&self, user: &str) -> bool {
        self.state.lock().await.carts.contains_key(&UserId::new(user))
    }

    /// Let `n` more unit mutations succeed, then fail every one after.
    pub async fn fail_after(&self, n: u32) {
        self.state.lock().await.fail_after = Some(n);
    }

    /// Fail every call while set.
    pub async fn set_offline(&self, offline: bool) {
        self.state.lock().await.offline = offline;
    }

    /// Fail catalog reads while set; the cart itself stays reachable.
    pub async fn set_catalog_offline(&self, offline: bool) {
        self.state.lock().await.catalog_offline = offline;
    }

    /// Fail line removals while set.
    pub async fn fail_removals(&self, fail: bool) {
        self.state.lock().await.fail_removals = fail;
    }

    pub async fn set_stock(&self, product: &str, size: &str, stock: u32) {
        let mut state = self.state.lock().await;
        if let Some(option) = state
            .products
            .iter_mut()
            .find(|p| p.id.as_str() == product)
            .and_then(|p| p.options.iter_mut().find(|o| o.size == size))
        {
            option.stock = stock;
        }
    }

    /// Calls to any collaborator method.
    pub async fn calls(&self) -> u32 {
        self.state.lock().await.calls
    }

    /// Unit mutations (add, reduce, remove line).
    pub async fn unit_calls(&self) -> u32 {
        self.state.lock().await.unit_calls
    }

    pub async fn reset_calls(&self) {
        let mut state = self.state.lock().await;
        state.calls = 0;
        state.unit_calls = 0;
    }

    /// Orders accepted so far.
    pub async fn submitted(&self) -> Vec<Order> {
        self.state
            .lock()
            .await
            .orders
            .iter()
            .map(|(order, _)| order.clone())
            .collect()
    }
}

#[async_trait]
impl CartBackend for InMemoryBackend {
    async fn ensure_cart(&self, user: &UserId) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.enter()?;
        state.carts.entry(user.clone()).or_default();
        Ok(())
    }

    async fn add_unit(&self, user: &UserId, key: &LineKey) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.enter_unit()?;
        let stock = state
            .product(&key.product_id)?
            .option(&key.size)
            .map_or(0, |o| o.stock);

        let lines = state.cart_mut(user)?;
        let held = lines
            .iter()
            .find(|l| &l.key == key)
            .map_or(0, |l| l.quantity);
        if held >= stock {
            return Err(CartError::OutOfStock(key.clone()));
        }
        match lines.iter_mut().find(|l| &l.key == key) {
            Some(line) => line.quantity += 1,
            None => lines.push(RemoteLine {
                key: key.clone(),
                quantity: 1,
            }),
        }
        Ok(())
    }

    async fn reduce_unit(&self, user: &UserId, key: &LineKey) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.enter_unit()?;
        let lines = state.cart_mut(user)?;
        let Some(pos) = lines.iter().position(|l| &l.key == key) else {
            return Err(CartError::LineNotFound(key.clone()));
        };
        if let Some(line) = lines.get_mut(pos) {
            line.quantity -= 1;
            if line.quantity == 0 {
                lines.remove(pos);
            }
        }
        Ok(())
    }

    async fn remove_line(&self, user: &UserId, key: &LineKey) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.enter_unit()?;
        if state.fail_removals {
            return Err(offline());
        }
        state.cart_mut(user)?.retain(|l| &l.key != key);
        Ok(())
    }

    async fn read_lines(&self, user: &UserId) -> Result<Option<Vec<RemoteLine>>, CartError> {
        let mut state = self.state.lock().await;
        state.enter()?;
        Ok(state.carts.get(user).cloned())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryBackend {
    async fn get_product(&self, id: &ProductId) -> Result<Product, CartError> {
        let mut state = self.state.lock().await;
        state.enter_catalog()?;
        state.product(id).cloned()
    }

    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Product>, CartError> {
        let mut state = self.state.lock().await;
        state.enter_catalog()?;
        Ok(filters
            .apply(query, &state.products)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn categories(&self) -> Result<Vec<String>, CartError> {
        let mut state = self.state.lock().await;
        state.enter_catalog()?;
        Ok(distinct(state.products.iter().filter_map(|p| p.category.clone())))
    }

    async fn animal_types(&self) -> Result<Vec<String>, CartError> {
        let mut state = self.state.lock().await;
        state.enter_catalog()?;
        Ok(distinct(
            state.products.iter().filter_map(|p| p.animal_type.clone()),
        ))
    }
}

fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

#[async_trait]
impl OrderFulfillment for InMemoryBackend {
    async fn submit(&self, order: &Order) -> Result<OrderRecord, CartError> {
        let mut state = self.state.lock().await;
        state.enter()?;
        if let Some((_, record)) = state
            .orders
            .iter()
            .find(|(o, _)| o.idempotency_key == order.idempotency_key)
        {
            return Ok(record.clone());
        }

        let id = OrderId::new(format!("order{}", state.orders.len() + 1));
        let record = OrderRecord {
            order_code: OrderRecord::fallback_code(&id),
            status: OrderStatus::Pending,
            tracking_number: None,
            total: order.totals.total,
            item_count: order.items.len(),
            created_at: Some(order.created_at),
            updated_at: None,
            is_reviewed: false,
            id,
        };
        state.orders.push((order.clone(), record.clone()));
        Ok(record)
    }
}

/// Which favorites endpoint a mutation went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FavoriteRoute {
    /// `/favorites/user/{userId}/...`
    User,
    /// `/favorites/{listId}/...`
    List,
    /// `/favorites/{listId}/force-remove`
    Force,
}

/// A favorites call, in the order it reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteCall {
    ResolveList,
    Items,
    Add(FavoriteRoute),
    Remove(FavoriteRoute),
}

#[derive(Default)]
struct AccountState {
    favorite_refs: HashMap<UserId, FavoriteListId>,
    favorite_lists: HashMap<FavoriteListId, Vec<ProductId>>,
    failing_routes: HashSet<FavoriteRoute>,
    favorite_calls: Vec<FavoriteCall>,

    order_history: HashMap<UserId, Value>,
    reviews: Vec<Value>,
    reviewed: Vec<OrderId>,
    fail_mark_reviewed: bool,
    reviews_offline: bool,

    addresses: HashMap<UserId, Vec<Address>>,
    next_address: u32,
    address_calls: u32,
}

impl AccountState {
    fn favorite(&mut self, call: FavoriteCall) -> Result<(), CartError> {
        self.favorite_calls.push(call);
        let route = match call {
            FavoriteCall::Add(route) | FavoriteCall::Remove(route) => route,
            FavoriteCall::ResolveList | FavoriteCall::Items => return Ok(()),
        };
        if self.failing_routes.contains(&route) {
            return Err(offline());
        }
        Ok(())
    }

    fn list_mut(&mut self, list: &FavoriteListId) -> Result<&mut Vec<ProductId>, CartError> {
        self.favorite_lists
            .get_mut(list)
            .ok_or_else(|| CartError::Network(ApiError::NotFound(format!("favorites {list}"))))
    }

    fn user_list_mut(&mut self, user: &UserId) -> Result<&mut Vec<ProductId>, CartError> {
        let list = self
            .favorite_refs
            .get(user)
            .cloned()
            .ok_or_else(|| CartError::Network(ApiError::NotFound(format!("favorites of {user}"))))?;
        self.list_mut(&list)
    }

    fn enter_reviews(&self) -> Result<(), CartError> {
        if self.reviews_offline {
            return Err(offline());
        }
        Ok(())
    }

    fn address_index(&self, id: &AddressId) -> Option<(UserId, usize)> {
        self.addresses.iter().find_map(|(user, list)| {
            list.iter()
                .position(|a| &a.id == id)
                .map(|pos| (user.clone(), pos))
        })
    }

    fn store_address(&mut self, user: &UserId, address: Address) -> Address {
        let list = self.addresses.entry(user.clone()).or_default();
        if address.is_default {
            for other in list.iter_mut() {
                other.is_default = false;
            }
        }
        match list.iter_mut().find(|a| a.id == address.id) {
            Some(existing) => *existing = address.clone(),
            None => list.push(address.clone()),
        }
        address
    }
}

fn address_from_draft(id: AddressId, draft: &AddressDraft) -> Address {
    Address {
        id,
        label: draft.label().to_string(),
        name: draft.name.trim().to_string(),
        lastname: draft.lastname().to_string(),
        phone: draft.phone.trim().to_string(),
        detail: draft.detail.trim().to_string(),
        zip_code: draft.zip_code.trim().to_string(),
        province: draft.province.trim().to_string(),
        district: draft.district.trim().to_string(),
        is_default: draft.is_default,
    }
}

/// Favorites, order history, reviews and addresses held in memory.
#[derive(Default)]
pub struct InMemoryAccount {
    state: Mutex<AccountState>,
}

impl InMemoryAccount {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Give a user a favorites list holding `products`.
    #[must_use]
    pub fn with_favorites(mut self, user: &str, list: &str, products: &[&str]) -> Self {
        let state = self.state.get_mut();
        let list = FavoriteListId::new(list);
        state.favorite_refs.insert(UserId::new(user), list.clone());
        state
            .favorite_lists
            .insert(list, products.iter().map(|p| ProductId::new(*p)).collect());
        self
    }

    /// Make every call to a favorites route fail.
    pub async fn fail_favorite_route(&self, route: FavoriteRoute) {
        self.state.lock().await.failing_routes.insert(route);
    }

    pub async fn favorite_calls(&self) -> Vec<FavoriteCall> {
        self.state.lock().await.favorite_calls.clone()
    }

    pub async fn clear_favorite_calls(&self) {
        self.state.lock().await.favorite_calls.clear();
    }

    pub async fn favorite_items(&self, list: &str) -> Vec<ProductId> {
        self.state
            .lock()
            .await
            .favorite_lists
            .get(&FavoriteListId::new(list))
            .cloned()
            .unwrap_or_default()
    }

    /// Set the raw order history response for a user.
    pub async fn set_order_history(&self, user: &str, raw: Value) {
        self.state
            .lock()
            .await
            .order_history
            .insert(UserId::new(user), raw);
    }

    /// Fail flagging orders as reviewed while set.
    pub async fn fail_mark_reviewed(&self, fail: bool) {
        self.state.lock().await.fail_mark_reviewed = fail;
    }

    /// Fail every review endpoint while set.
    pub async fn set_reviews_offline(&self, offline: bool) {
        self.state.lock().await.reviews_offline = offline;
    }

    /// Orders flagged as reviewed, in order.
    pub async fn reviewed_orders(&self) -> Vec<OrderId> {
        self.state.lock().await.reviewed.clone()
    }

    /// Calls to any address endpoint.
    pub async fn address_calls(&self) -> u32 {
        self.state.lock().await.address_calls
    }
}

#[async_trait]
impl FavoritesBackend for InMemoryAccount {
    async fn list_id(&self, user: &UserId) -> Result<Option<FavoriteListId>, CartError> {
        let mut state = self.state.lock().await;
        state.favorite(FavoriteCall::ResolveList)?;
        Ok(state.favorite_refs.get(user).cloned())
    }

    async fn items(&self, list: &FavoriteListId) -> Result<Vec<ProductId>, CartError> {
        let mut state = self.state.lock().await;
        state.favorite(FavoriteCall::Items)?;
        state.list_mut(list).cloned()
    }

    async fn add_for_user(&self, user: &UserId, product: &ProductId) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.favorite(FavoriteCall::Add(FavoriteRoute::User))?;
        let items = state.user_list_mut(user)?;
        if !items.contains(product) {
            items.push(product.clone());
        }
        Ok(())
    }

    async fn add_to_list(
        &self,
        list: &FavoriteListId,
        _user: &UserId,
        product: &ProductId,
    ) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.favorite(FavoriteCall::Add(FavoriteRoute::List))?;
        let items = state.list_mut(list)?;
        if !items.contains(product) {
            items.push(product.clone());
        }
        Ok(())
    }

    async fn remove_for_user(&self, user: &UserId, product: &ProductId) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.favorite(FavoriteCall::Remove(FavoriteRoute::User))?;
        state.user_list_mut(user)?.retain(|p| p != product);
        Ok(())
    }

    async fn remove_from_list(
        &self,
        list: &FavoriteListId,
        _user: &UserId,
        product: &ProductId,
    ) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.favorite(FavoriteCall::Remove(FavoriteRoute::List))?;
        state.list_mut(list)?.retain(|p| p != product);
        Ok(())
    }

    async fn force_remove(
        &self,
        list: &FavoriteListId,
        product: &ProductId,
    ) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.favorite(FavoriteCall::Remove(FavoriteRoute::Force))?;
        state.list_mut(list)?.retain(|p| p != product);
        Ok(())
    }
}

#[async_trait]
impl OrderBackend for InMemoryAccount {
    async fn orders_of(&self, user: &UserId) -> Result<Value, CartError> {
        let state = self.state.lock().await;
        Ok(state
            .order_history
            .get(user)
            .cloned()
            .unwrap_or_else(|| json!([])))
    }

    async fn order(&self, id: &OrderId) -> Result<Value, CartError> {
        let state = self.state.lock().await;
        state
            .order_history
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .find(|o| o.get("_id").and_then(Value::as_str) == Some(id.as_str()))
            .cloned()
            .ok_or_else(|| CartError::Network(ApiError::NotFound(format!("order {id}"))))
    }

    async fn create_review(
        &self,
        user: &UserId,
        order: &OrderId,
        rating: Rating,
        comment: &str,
    ) -> Result<Value, CartError> {
        let mut state = self.state.lock().await;
        state.enter_reviews()?;
        let review = json!({
            "_id": format!("review{}", state.reviews.len() + 1),
            "orderId": order.as_str(),
            "userId": user.as_str(),
            "rating": rating.stars(),
            "comment": comment,
        });
        state.reviews.push(review.clone());
        Ok(review)
    }

    async fn mark_reviewed(&self, order: &OrderId) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        if state.fail_mark_reviewed {
            return Err(offline());
        }
        state.reviewed.push(order.clone());
        Ok(())
    }

    async fn reviews_of_user(&self) -> Result<Value, CartError> {
        let state = self.state.lock().await;
        state.enter_reviews()?;
        Ok(Value::Array(state.reviews.clone()))
    }

    async fn review_of_order(&self, order: &OrderId) -> Result<Value, CartError> {
        let state = self.state.lock().await;
        state.enter_reviews()?;
        state
            .reviews
            .iter()
            .find(|r| r.get("orderId").and_then(Value::as_str) == Some(order.as_str()))
            .cloned()
            .ok_or_else(|| CartError::Network(ApiError::NotFound(format!("review of {order}"))))
    }
}

#[async_trait]
impl AddressBackend for InMemoryAccount {
    async fn list(&self, user: &UserId) -> Result<Vec<Address>, CartError> {
        let mut state = self.state.lock().await;
        state.address_calls += 1;
        Ok(state.addresses.get(user).cloned().unwrap_or_default())
    }

    async fn get(&self, id: &AddressId) -> Result<Address, CartError> {
        let mut state = self.state.lock().await;
        state.address_calls += 1;
        let (user, pos) = state
            .address_index(id)
            .ok_or_else(|| CartError::Network(ApiError::NotFound(format!("address {id}"))))?;
        state
            .addresses
            .get(&user)
            .and_then(|list| list.get(pos))
            .cloned()
            .ok_or_else(|| CartError::Network(ApiError::NotFound(format!("address {id}"))))
    }

    async fn create(&self, user: &UserId, draft: &AddressDraft) -> Result<Address, CartError> {
        let mut state = self.state.lock().await;
        state.address_calls += 1;
        state.next_address += 1;
        let id = AddressId::new(format!("address{}", state.next_address));
        Ok(state.store_address(user, address_from_draft(id, draft)))
    }

    async fn update(
        &self,
        user: &UserId,
        id: &AddressId,
        draft: &AddressDraft,
    ) -> Result<Address, CartError> {
        let mut state = self.state.lock().await;
        state.address_calls += 1;
        if state.address_index(id).is_none() {
            return Err(CartError::Network(ApiError::NotFound(format!("address {id}"))));
        }
        Ok(state.store_address(user, address_from_draft(id.clone(), draft)))
    }

    async fn delete(&self, _user: &UserId, id: &AddressId) -> Result<(), CartError> {
        let mut state = self.state.lock().await;
        state.address_calls += 1;
        let (owner, pos) = state
            .address_index(id)
            .ok_or_else(|| CartError::Network(ApiError::NotFound(format!("address {id}"))))?;
        if let Some(list) = state.addresses.get_mut(&owner) {
            list.remove(pos);
        }
        Ok(())
    }
}

/// Fixed identity, for wiring services without a real session.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    user: Option<UserId>,
}

impl StaticAuth {
    #[must_use]
    pub fn user(id: &str) -> Self {
        Self {
            user: Some(UserId::new(id)),
        }
    }

    #[must_use]
    pub const fn anonymous() -> Self {
        Self { user: None }
    }
}

#[async_trait]
impl Authenticator for StaticAuth {
    async fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    async fn current_user_id(&self) -> Result<UserId, CartError> {
        self.user.clone().ok_or(CartError::Unauthenticated)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pethub_core::{Cart, Discount};

    use super::*;

    #[tokio::test]
    async fn test_add_unit_enforces_stock() {
        let backend = InMemoryBackend::new().with_product("p1", &[("M", 100, 1)]);
        let user = UserId::new("u1");
        let key = LineKey::new("p1", "M");
        backend.ensure_cart(&user).await.unwrap();

        backend.add_unit(&user, &key).await.unwrap();
        let err = backend.add_unit(&user, &key).await.unwrap_err();
        assert!(matches!(err, CartError::OutOfStock(_)));
    }

    #[tokio::test]
    async fn test_submit_is_idempotent() {
        let backend = InMemoryBackend::new();
        let cart = Cart::new(vec![pethub_core::CartLineItem {
            product_id: ProductId::new("p1"),
            size: "M".to_string(),
            unit_price: Price::from_whole(10),
            quantity: 1,
        }]);
        let order = Order::from_cart(UserId::new("u1"), &cart, Price::ZERO, Discount::NONE);

        let first = backend.submit(&order).await.unwrap();
        let second = backend.submit(&order).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.submitted().await.len(), 1);
    }
}
