//! Conversions from PetHub wire types to domain types.

use pethub_core::{
    Address, AddressId, DEFAULT_ADDRESS_LABEL, LineKey, OrderId, OrderRecord, OrderStatus, Price,
    Product, ProductId, ProductOption, Rating, Review, ReviewId,
};
use serde_json::Value;
use tracing::warn;

use super::types::{AddressDto, CartDto, OrderDto, ProductDto, ReviewDto};
use crate::cart::RemoteLine;

// =============================================================================
// Products
// =============================================================================

/// Convert a product document.
///
/// `fallback_id` is used when the document omits its own id (the admin
/// endpoint does). `image_url` turns a stored file name into an absolute URL.
pub fn convert_product(
    dto: ProductDto,
    fallback_id: Option<&ProductId>,
    image_url: impl Fn(&str) -> String,
) -> Option<Product> {
    let id = dto
        .id
        .map(ProductId::new)
        .or_else(|| fallback_id.cloned())?;

    Some(Product {
        id,
        name: dto.name,
        description: dto.description,
        image: dto
            .image_url
            .filter(|f| !f.is_empty())
            .map(|f| image_url(&f)),
        category: dto.category,
        animal_type: dto.animal_type,
        options: dto
            .options
            .into_iter()
            .map(|o| ProductOption {
                size: o.size,
                price: o.price,
                stock: u32::try_from(o.stock.max(0)).unwrap_or(u32::MAX),
            })
            .collect(),
    })
}

// =============================================================================
// Cart
// =============================================================================

/// Convert an embedded cart document into remote lines.
///
/// Duplicate (product, size) entries are merged and zero-quantity entries
/// dropped, so the result holds each key at most once.
pub fn convert_cart_lines(cart: CartDto) -> Vec<RemoteLine> {
    let mut lines: Vec<RemoteLine> = Vec::with_capacity(cart.items.len());
    for item in cart.items {
        if item.quantity == 0 {
            continue;
        }
        let key = LineKey::new(item.product_id.id(), item.size);
        match lines.iter_mut().find(|l| l.key == key) {
            Some(existing) => {
                warn!(key = %key, "Backend cart holds a duplicate line, merging");
                existing.quantity += item.quantity;
            }
            None => lines.push(RemoteLine {
                key,
                quantity: item.quantity,
            }),
        }
    }
    lines
}

// =============================================================================
// Orders
// =============================================================================

/// Convert an order document. `fallback_id` names the order when the
/// document carries no id of its own.
pub fn convert_order(dto: OrderDto, fallback_id: &str) -> OrderRecord {
    let id = OrderId::new(dto.id.unwrap_or_else(|| fallback_id.to_string()));
    let order_code = dto
        .order_code
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| OrderRecord::fallback_code(&id));

    OrderRecord {
        order_code,
        status: dto
            .status
            .map(OrderStatus::from)
            .unwrap_or_default(),
        tracking_number: dto.tracking_number.filter(|t| !t.is_empty()),
        total: dto.total_price.unwrap_or(Price::ZERO),
        item_count: dto.items.len(),
        created_at: dto.created_at,
        updated_at: dto.updated_at,
        is_reviewed: dto.is_reviewed,
        id,
    }
}

/// Convert a review document. `fallback_order` names the order when the
/// document omits it. Reviews without a usable rating are dropped.
pub fn convert_review(dto: ReviewDto, fallback_order: Option<&OrderId>) -> Option<Review> {
    let order_id = dto
        .order_id
        .map(|r| OrderId::new(r.id()))
        .or_else(|| fallback_order.cloned())?;
    let Some(rating) = dto.rating.and_then(Rating::new) else {
        warn!(order_id = %order_id, rating = ?dto.rating, "Review has no valid rating, skipping");
        return None;
    };

    Some(Review {
        id: dto.id.filter(|id| !id.is_empty()).map(ReviewId::new),
        order_id,
        rating,
        comment: dto.comment,
        created_at: dto.created_at,
    })
}

// =============================================================================
// Addresses
// =============================================================================

/// Convert an address document. Addresses without an id cannot be edited
/// or deleted and are dropped.
pub fn convert_address(dto: AddressDto) -> Option<Address> {
    let id = dto.id.filter(|id| !id.is_empty()).map(AddressId::new)?;
    Some(Address {
        id,
        label: dto
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ADDRESS_LABEL.to_string()),
        name: dto.name,
        lastname: dto.lastname,
        phone: dto.phone,
        detail: dto.address,
        zip_code: dto.zip_code,
        province: dto.province,
        district: dto.district,
        is_default: dto.is_default,
    })
}

/// Convert raw address entries, skipping ids-only references and
/// malformed documents.
pub fn convert_addresses(items: Vec<Value>) -> Vec<Address> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<AddressDto>(item) {
            Ok(dto) => convert_address(dto),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable address");
                None
            }
        })
        .collect()
}

// =============================================================================
// Favorites
// =============================================================================

/// Product id of a stored favorites item.
///
/// Accepts a bare id, a populated product (`_id` or `id`), or a wrapper
/// whose `productId` is either of those.
pub fn favorite_product_id(item: &Value) -> Option<ProductId> {
    match item {
        Value::String(id) if !id.is_empty() => Some(ProductId::new(id.as_str())),
        Value::Object(map) => {
            if let Some(inner) = map.get("productId") {
                return favorite_product_id(inner);
            }
            map.get("_id")
                .or_else(|| map.get("id"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(ProductId::new)
        }
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::api::types::{CartItemDto, DocRef, ProductOptionDto};

    fn upload(file: &str) -> String {
        format!("https://api.test/uploads/{file}")
    }

    #[test]
    fn test_convert_product_uses_fallback_id_and_upload_url() {
        let dto = ProductDto {
            id: None,
            name: "Kibble".to_string(),
            description: String::new(),
            image_url: Some("k.jpg".to_string()),
            category: None,
            animal_type: None,
            options: vec![ProductOptionDto {
                size: "2kg".to_string(),
                price: Price::from_whole(349),
                stock: -2,
            }],
        };
        let product = convert_product(dto, Some(&ProductId::new("p1")), upload).unwrap();
        assert_eq!(product.id, ProductId::new("p1"));
        assert_eq!(product.image.as_deref(), Some("https://api.test/uploads/k.jpg"));
        assert_eq!(product.option("2kg").unwrap().stock, 0);
    }

    #[test]
    fn test_convert_product_without_any_id_is_dropped() {
        let dto = ProductDto {
            id: None,
            name: "Ghost".to_string(),
            description: String::new(),
            image_url: None,
            category: None,
            animal_type: None,
            options: vec![],
        };
        assert!(convert_product(dto, None, upload).is_none());
    }

    #[test]
    fn test_convert_cart_lines_merges_duplicates() {
        let item = |id: &str, size: &str, quantity| CartItemDto {
            product_id: DocRef::Id(id.to_string()),
            size: size.to_string(),
            quantity,
        };
        let cart = CartDto {
            id: Some("c1".to_string()),
            items: vec![item("p1", "M", 2), item("p2", "S", 0), item("p1", "M", 1)],
        };
        let lines = convert_cart_lines(cart);
        assert_eq!(
            lines,
            vec![RemoteLine {
                key: LineKey::new("p1", "M"),
                quantity: 3
            }]
        );
    }

    #[test]
    fn test_convert_order_falls_back_to_generated_code() {
        let dto: OrderDto =
            serde_json::from_value(json!({"_id": "abcdef123", "status": "Shipped"})).unwrap();
        let record = convert_order(dto, "unused");
        assert_eq!(record.order_code, "ORDabcde");
        assert_eq!(record.status, OrderStatus::Shipped);
        assert_eq!(record.total, Price::ZERO);
    }

    #[test]
    fn test_convert_order_carries_review_flag() {
        let dto: OrderDto =
            serde_json::from_value(json!({"_id": "o1", "isReviewed": true})).unwrap();
        assert!(convert_order(dto, "").is_reviewed);

        let dto: OrderDto = serde_json::from_value(json!({"_id": "o2"})).unwrap();
        assert!(!convert_order(dto, "").is_reviewed);
    }

    #[test]
    fn test_convert_addresses_skips_bare_ids_and_blank_labels_default() {
        let items = vec![
            json!("a0"),
            json!({"_id": "a1", "label": "", "name": "Somchai", "address": "99/1",
                   "zipCode": "10110", "isDefault": true}),
            json!({"name": "No id"}),
        ];
        let addresses = convert_addresses(items);
        assert_eq!(addresses.len(), 1);
        let address = &addresses[0];
        assert_eq!(address.id, AddressId::new("a1"));
        assert_eq!(address.label, DEFAULT_ADDRESS_LABEL);
        assert_eq!(address.detail, "99/1");
        assert_eq!(address.zip_code, "10110");
        assert!(address.is_default);
    }

    #[test]
    fn test_convert_review_requires_valid_rating() {
        let dto: ReviewDto =
            serde_json::from_value(json!({"_id": "r1", "rating": 5, "comment": "Great"})).unwrap();
        let review = convert_review(dto, Some(&OrderId::new("o1"))).unwrap();
        assert_eq!(review.order_id, OrderId::new("o1"));
        assert_eq!(review.rating.stars(), 5);

        let dto: ReviewDto = serde_json::from_value(json!({"orderId": "o1", "rating": 0})).unwrap();
        assert!(convert_review(dto, None).is_none());

        let dto: ReviewDto = serde_json::from_value(json!({"rating": 3})).unwrap();
        assert!(convert_review(dto, None).is_none());
    }

    #[test]
    fn test_favorite_product_id_shapes() {
        assert_eq!(favorite_product_id(&json!("p1")), Some(ProductId::new("p1")));
        assert_eq!(
            favorite_product_id(&json!({"_id": "p2", "name": "Bed"})),
            Some(ProductId::new("p2"))
        );
        assert_eq!(
            favorite_product_id(&json!({"productId": {"id": "p3"}})),
            Some(ProductId::new("p3"))
        );
        assert_eq!(favorite_product_id(&json!(42)), None);
        assert_eq!(favorite_product_id(&json!("")), None);
    }
}
