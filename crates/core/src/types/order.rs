//! Orders, order totals, and discount parsing.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::cart::{Cart, CartLineItem};
use super::id::{OrderId, UserId};
use super::price::Price;
use super::status::OrderStatus;

/// Default flat shipping fee per order, in baht.
pub const DEFAULT_SHIPPING_FEE: i64 = 20;

/// A discount amount entered by the shopper.
///
/// Parsing never fails: anything that is not a finite, non-negative number
/// becomes zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Discount(Price);

impl Discount {
    pub const NONE: Self = Self(Price::ZERO);

    /// Clamp an amount to a valid discount.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(Price::new(amount.max(Decimal::ZERO)))
    }

    /// Parse free text leniently.
    ///
    /// Accepts a leading numeric prefix the way a browser number field does
    /// (`"12.5abc"` is 12.5, `"1e3"` is 1000), and treats blank, `NaN`,
    /// negative or out-of-range input as 0.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        let prefix = trimmed.get(..numeric_prefix_len(trimmed)).unwrap_or_default();
        let parsed = if prefix.contains(['e', 'E']) {
            Decimal::from_scientific(prefix)
        } else {
            Decimal::from_str(prefix)
        };
        parsed.map_or(Self::NONE, Self::new)
    }

    #[must_use]
    pub const fn amount(&self) -> Price {
        self.0
    }
}

impl From<&str> for Discount {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

/// Length of the longest `[+-]?digits[.digits][(e|E)[+-]?digits]` prefix.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    for &b in bytes.iter().skip(end) {
        match b {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if !seen_digit {
        return 0;
    }

    // An exponent only counts when at least one digit follows it.
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let digits = bytes
            .iter()
            .skip(exp_end)
            .take_while(|b| b.is_ascii_digit())
            .count();
        if digits > 0 {
            return exp_end + digits;
        }
    }
    end
}

/// Money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Price,
    pub shipping: Price,
    pub discount: Price,
    pub total: Price,
}

impl OrderTotals {
    /// `total = subtotal + shipping − discount`.
    ///
    /// The total is not floored: a discount larger than the order is passed
    /// through so the backend can reject it.
    #[must_use]
    pub fn compute(cart: &Cart, shipping: Price, discount: Discount) -> Self {
        let subtotal = cart.subtotal();
        let discount = discount.amount();
        Self {
            subtotal,
            shipping,
            discount,
            total: subtotal + shipping - discount,
        }
    }
}

/// An immutable order snapshot assembled at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub user_id: UserId,
    pub items: Vec<CartLineItem>,
    pub totals: OrderTotals,
    pub status: OrderStatus,
    /// Key the backend uses to deduplicate resubmitted orders.
    pub idempotency_key: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Snapshot a cart into a new pending order.
    #[must_use]
    pub fn from_cart(user_id: UserId, cart: &Cart, shipping: Price, discount: Discount) -> Self {
        Self {
            user_id,
            items: cart.items.clone(),
            totals: OrderTotals::compute(cart, shipping, discount),
            status: OrderStatus::Pending,
            idempotency_key: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .map(|i| i.quantity)
            .fold(0, u32::saturating_add)
    }
}

/// An order as recorded by the fulfillment backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub order_code: String,
    pub status: OrderStatus,
    pub tracking_number: Option<String>,
    pub total: Price,
    pub item_count: usize,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Whether the shopper has left a review for this order.
    #[serde(default)]
    pub is_reviewed: bool,
}

impl OrderRecord {
    /// Human-facing code, falling back to `ORD` plus the first five id chars.
    #[must_use]
    pub fn fallback_code(id: &OrderId) -> String {
        let prefix: String = id.as_str().chars().take(5).collect();
        format!("ORD{prefix}")
    }
}
