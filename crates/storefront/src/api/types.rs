//! Wire types for the PetHub REST API.
//!
//! The backend is loosely typed: references such as a user's cart or a
//! cart line's product arrive either as a bare id string or as a populated
//! document. Those shapes are modelled as untagged enums here and resolved
//! in [`super::conversions`].

use pethub_core::{Price, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Extract the `message` field of an error body, falling back to the raw
/// text.
pub fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
    }

    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

// =============================================================================
// Auth / users
// =============================================================================

/// `GET /auth/profile` response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDto {
    pub id: UserId,
    #[serde(default)]
    pub line_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
}

/// `GET /users/{id}` response, reduced to the fields the client needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDto {
    #[serde(default)]
    pub cart: Option<CartRef>,
    #[serde(default)]
    pub favorites: Option<DocRef>,
    /// Kept raw so one malformed entry does not hide the others.
    #[serde(default)]
    pub addresses: Vec<serde_json::Value>,
}

/// A user's cart: an id, or the populated cart document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CartRef {
    Embedded(CartDto),
    Id(String),
}

/// Populated cart document.
#[derive(Debug, Clone, Deserialize)]
pub struct CartDto {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub items: Vec<CartItemDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    pub product_id: DocRef,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub quantity: u32,
}

/// Reference to another document: a bare id or an object carrying one.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DocRef {
    Id(String),
    Doc {
        #[serde(rename = "_id", alias = "id")]
        id: String,
    },
}

impl DocRef {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) | Self::Doc { id } => id,
        }
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Product document from `/admin/products/{id}` and `/products/search`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDto {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub animal_type: Option<String>,
    #[serde(default)]
    pub options: Vec<ProductOptionDto>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductOptionDto {
    pub size: String,
    #[serde(default)]
    pub price: Price,
    /// Negative stock has been seen after concurrent orders.
    #[serde(default)]
    pub stock: i64,
}

/// Search results: a bare array, or wrapped in `{ "products": [...] }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProductList {
    Bare(Vec<ProductDto>),
    Wrapped { products: Vec<ProductDto> },
}

impl ProductList {
    #[must_use]
    pub fn into_vec(self) -> Vec<ProductDto> {
        match self {
            Self::Bare(products) | Self::Wrapped { products } => products,
        }
    }
}

/// Query string of `GET /products/search`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery<'a> {
    pub q: &'a str,
    pub category: &'a str,
    pub animal_type: &'a str,
    pub price: &'a str,
}

// =============================================================================
// Cart mutations
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCartRequest<'a> {
    pub user_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest<'a> {
    pub product_id: &'a str,
    pub size: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReduceItemRequest<'a> {
    pub product_id: &'a str,
    pub size: &'a str,
    pub remove_all: bool,
}

// =============================================================================
// Checkout / orders
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub discount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub subtotal: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub shipping: Decimal,
    pub items: Vec<CheckoutItem>,
    pub idempotency_key: Uuid,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutItem {
    pub product_id: String,
    pub size: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
}

/// Order document from `/orders/...` and the checkout response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub order_code: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tracking_number: Option<String>,
    #[serde(default)]
    pub total_price: Option<Price>,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub is_reviewed: bool,
}

/// Checkout response: `{ "order": {...} }` or the bare order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CheckoutResponse {
    Wrapped { order: OrderDto },
    Bare(OrderDto),
}

impl CheckoutResponse {
    #[must_use]
    pub fn into_order(self) -> OrderDto {
        match self {
            Self::Wrapped { order } | Self::Bare(order) => order,
        }
    }
}

// =============================================================================
// Favorites
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteRequest<'a> {
    pub product_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<&'a str>,
}

/// `GET /favorites/{id}` response.
///
/// Items are kept raw: the backend has stored them as bare ids, populated
/// products, and `{ productId }` wrappers at different times.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FavoritesDto {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

// =============================================================================
// Addresses
// =============================================================================

/// Address document from `/addresses/{id}` and the user record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressDto {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub province: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Body of `POST /addresses` and `PATCH /addresses/{id}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRequest<'a> {
    pub user_id: &'a str,
    pub label: &'a str,
    pub name: &'a str,
    pub lastname: &'a str,
    pub phone: &'a str,
    pub address: &'a str,
    pub zip_code: &'a str,
    pub province: &'a str,
    pub district: &'a str,
    pub is_default: bool,
}

/// Body naming the acting user, as `DELETE /addresses/{id}` expects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef<'a> {
    pub user_id: &'a str,
}

// =============================================================================
// Reviews
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest<'a> {
    pub order_id: &'a str,
    pub rating: u8,
    pub comment: &'a str,
    pub user_id: &'a str,
}

/// Review document from `/reviews/...`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDto {
    #[serde(rename = "_id", alias = "id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub order_id: Option<DocRef>,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// `PATCH /orders/{id}` body marking an order as reviewed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    pub is_reviewed: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message_field() {
        assert_eq!(error_message(r#"{"message":"Out of stock"}"#), "Out of stock");
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }

    #[test]
    fn test_user_cart_as_id_or_document() {
        let user: UserDto = serde_json::from_str(r#"{"cart":"c1","favorites":"f1"}"#).unwrap();
        assert!(matches!(user.cart, Some(CartRef::Id(ref id)) if id == "c1"));
        assert_eq!(user.favorites.unwrap().id(), "f1");

        let json = r#"{"cart":{"_id":"c1","items":[
            {"productId":"p1","size":"M","quantity":2},
            {"productId":{"_id":"p2","name":"Bed"},"size":"L","quantity":1}
        ]}}"#;
        let user: UserDto = serde_json::from_str(json).unwrap();
        let Some(CartRef::Embedded(cart)) = user.cart else {
            panic!("expected embedded cart");
        };
        let ids: Vec<_> = cart.items.iter().map(|i| i.product_id.id()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }

    #[test]
    fn test_address_request_uses_backend_field_names() {
        let body = AddressRequest {
            user_id: "u1",
            label: "Office",
            name: "Somchai",
            lastname: "",
            phone: "0812345678",
            address: "99/1",
            zip_code: "10110",
            province: "Bangkok",
            district: "Watthana",
            is_default: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["zipCode"], "10110");
        assert_eq!(json["address"], "99/1");
        assert_eq!(json["isDefault"], true);
        assert_eq!(json["userId"], "u1");
    }

    #[test]
    fn test_review_order_ref_shapes() {
        let review: ReviewDto =
            serde_json::from_str(r#"{"_id":"r1","orderId":{"_id":"o1"},"rating":4}"#).unwrap();
        assert_eq!(review.order_id.unwrap().id(), "o1");

        let review: ReviewDto = serde_json::from_str(r#"{"orderId":"o2"}"#).unwrap();
        assert_eq!(review.order_id.unwrap().id(), "o2");
        assert!(review.rating.is_none());
    }

    #[test]
    fn test_user_without_cart() {
        let user: UserDto = serde_json::from_str(r#"{"name":"Somchai"}"#).unwrap();
        assert!(user.cart.is_none());
    }

    #[test]
    fn test_product_accepts_numeric_prices() {
        let json = r#"{"_id":"p1","name":"Kibble","imageUrl":"k.jpg",
            "options":[{"size":"2kg","price":349.5,"stock":4}]}"#;
        let product: ProductDto = serde_json::from_str(json).unwrap();
        let option = product.options.first().unwrap();
        assert_eq!(option.price, Price::new(Decimal::new(3495, 1)));
        assert_eq!(option.stock, 4);
    }

    #[test]
    fn test_checkout_request_sends_numbers() {
        let body = CheckoutRequest {
            discount: Decimal::ZERO,
            subtotal: Decimal::new(300, 0),
            shipping: Decimal::new(20, 0),
            items: vec![CheckoutItem {
                product_id: "p1".to_string(),
                size: "M".to_string(),
                quantity: 2,
                price: Decimal::new(150, 0),
            }],
            idempotency_key: Uuid::nil(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["subtotal"], serde_json::json!(300.0));
        assert_eq!(json["items"][0]["productId"], "p1");
        assert!(json.get("idempotencyKey").is_some());
    }

    #[test]
    fn test_checkout_response_shapes() {
        let wrapped: CheckoutResponse =
            serde_json::from_str(r#"{"order":{"_id":"o1","orderCode":"ORD-1"}}"#).unwrap();
        assert_eq!(wrapped.into_order().id.as_deref(), Some("o1"));

        let bare: CheckoutResponse = serde_json::from_str(r#"{"_id":"o2"}"#).unwrap();
        assert_eq!(bare.into_order().id.as_deref(), Some("o2"));
    }
}
