//! Cart line items, carts, and the local cache entry format.

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Uniqueness key of a cart line: one product in one size.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineKey {
    pub product_id: ProductId,
    pub size: String,
}

impl LineKey {
    #[must_use]
    pub fn new(product_id: impl Into<ProductId>, size: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            size: size.into(),
        }
    }
}

impl std::fmt::Display for LineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.product_id, self.size)
    }
}

/// One (product, size) pairing and its quantity within a cart.
///
/// `quantity` is always at least 1; a line that would drop to zero is
/// removed from the cart instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub product_id: ProductId,
    pub size: String,
    /// Catalog price for this size at the time the line was added.
    pub unit_price: Price,
    pub quantity: u32,
}

impl CartLineItem {
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.size.clone())
    }

    #[must_use]
    pub fn matches(&self, key: &LineKey) -> bool {
        self.product_id == key.product_id && self.size == key.size
    }

    /// `unit_price × quantity`.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// An ordered collection of line items owned by one user session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartLineItem>,
}

impl Cart {
    #[must_use]
    pub const fn new(items: Vec<CartLineItem>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn line(&self, key: &LineKey) -> Option<&CartLineItem> {
        self.items.iter().find(|i| i.matches(key))
    }

    /// Quantity held for `key`, zero if the line is absent.
    #[must_use]
    pub fn quantity_of(&self, key: &LineKey) -> u32 {
        self.line(key).map_or(0, |i| i.quantity)
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .map(|i| i.quantity)
            .fold(0, u32::saturating_add)
    }

    /// `Σ(unit_price × quantity)` over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    /// Set the quantity of a line, inserting or removing as needed.
    ///
    /// A new line takes `unit_price`; an existing line keeps the price it
    /// was added at.
    pub fn set_quantity(&mut self, key: &LineKey, unit_price: Price, quantity: u32) {
        let pos = self.items.iter().position(|i| i.matches(key));
        match (pos, quantity) {
            (Some(idx), 0) => {
                self.items.remove(idx);
            }
            (Some(idx), q) => {
                if let Some(item) = self.items.get_mut(idx) {
                    item.quantity = q;
                }
            }
            (None, 0) => {}
            (None, q) => self.items.push(CartLineItem {
                product_id: key.product_id.clone(),
                size: key.size.clone(),
                unit_price,
                quantity: q,
            }),
        }
    }
}

/// Denormalized cart line persisted in the local cache.
///
/// Carries display fields so a cart can be rendered without reaching the
/// catalog while offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCacheEntry {
    pub product_id: ProductId,
    #[serde(rename = "option")]
    pub size: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl LocalCacheEntry {
    #[must_use]
    pub fn key(&self) -> LineKey {
        LineKey::new(self.product_id.clone(), self.size.clone())
    }

    /// The cart line this entry mirrors.
    #[must_use]
    pub fn to_line(&self) -> CartLineItem {
        CartLineItem {
            product_id: self.product_id.clone(),
            size: self.size.clone(),
            unit_price: self.price,
            quantity: self.quantity.max(1),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn line(p: &str, size: &str, price: i64, qty: u32) -> CartLineItem {
        CartLineItem {
            product_id: ProductId::new(p),
            size: size.to_string(),
            unit_price: Price::from_whole(price),
            quantity: qty,
        }
    }

    #[test]
    fn test_subtotal_is_sum_of_line_totals() {
        let cart = Cart::new(vec![line("a", "M", 120, 2), line("b", "L", 35, 3)]);
        assert_eq!(cart.subtotal(), Price::from_whole(345));
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_total_quantity_saturates_on_hand_edited_cache() {
        let cart = Cart::new(vec![line("a", "M", 1, u32::MAX), line("b", "L", 1, 5)]);
        assert_eq!(cart.total_quantity(), u32::MAX);
    }

    #[test]
    fn test_subtotal_independent_of_order() {
        let items = vec![
            line("a", "M", 120, 2),
            line("b", "L", 35, 3),
            line("c", "S", 999, 1),
        ];
        let forward = Cart::new(items.clone());
        let mut reversed = items;
        reversed.reverse();
        assert_eq!(forward.subtotal(), Cart::new(reversed).subtotal());
    }

    #[test]
    fn test_set_quantity_insert_update_remove() {
        let mut cart = Cart::default();
        let key = LineKey::new("a", "M");

        cart.set_quantity(&key, Price::from_whole(10), 2);
        assert_eq!(cart.quantity_of(&key), 2);

        cart.set_quantity(&key, Price::from_whole(99), 5);
        assert_eq!(cart.quantity_of(&key), 5);
        assert_eq!(cart.line(&key).unwrap().unit_price, Price::from_whole(10));

        cart.set_quantity(&key, Price::from_whole(10), 0);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_same_product_different_size_is_a_different_line() {
        let mut cart = Cart::default();
        cart.set_quantity(&LineKey::new("a", "M"), Price::from_whole(10), 1);
        cart.set_quantity(&LineKey::new("a", "L"), Price::from_whole(12), 1);
        assert_eq!(cart.items.len(), 2);
    }

    #[test]
    fn test_cache_entry_wire_format() {
        let json = r#"[{"productId":"p1","option":"M","price":150,"quantity":2,"name":"Kibble"}]"#;
        let entries: Vec<LocalCacheEntry> = serde_json::from_str(json).unwrap();
        let entry = entries.first().unwrap();
        assert_eq!(entry.key(), LineKey::new("p1", "M"));
        assert_eq!(entry.to_line().line_total(), Price::from_whole(300));
        assert!(entry.image.is_none());
    }
}
