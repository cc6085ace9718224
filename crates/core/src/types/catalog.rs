//! Product catalog types and client-side search filtering.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// Sentinel the backend uses for "no filter" on category and animal type.
pub const ALL_FILTER: &str = "ทั้งหมด";

/// A purchasable size of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOption {
    /// Size label, unique within a product (e.g. "M", "2kg").
    pub size: String,
    /// Unit price for this size.
    pub price: Price,
    /// Units currently purchasable.
    pub stock: u32,
}

/// A catalog product as seen by the cart subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Absolute image URL, if the product has one.
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub animal_type: Option<String>,
    pub options: Vec<ProductOption>,
}

impl Product {
    /// Find the option with the given size label.
    #[must_use]
    pub fn option(&self, size: &str) -> Option<&ProductOption> {
        self.options.iter().find(|o| o.size == size)
    }

    /// Cheapest option price, used for price-tier filtering.
    #[must_use]
    pub fn min_price(&self) -> Option<Price> {
        self.options.iter().map(|o| o.price).min()
    }
}

/// Coarse price band shown as baht signs in the storefront filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PriceTier {
    /// Under 200.
    Budget,
    /// 200 up to 500.
    Mid,
    /// 500 up to 1000.
    Premium,
    /// 1000 and above.
    Luxury,
}

impl PriceTier {
    /// Parse the filter token (`฿` through `฿฿฿฿`).
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim() {
            "฿" => Some(Self::Budget),
            "฿฿" => Some(Self::Mid),
            "฿฿฿" => Some(Self::Premium),
            "฿฿฿฿" => Some(Self::Luxury),
            _ => None,
        }
    }

    /// The filter token sent to the backend.
    #[must_use]
    pub const fn token(&self) -> &'static str {
        match self {
            Self::Budget => "฿",
            Self::Mid => "฿฿",
            Self::Premium => "฿฿฿",
            Self::Luxury => "฿฿฿฿",
        }
    }

    /// Whether a price falls in this tier.
    #[must_use]
    pub fn contains(&self, price: Price) -> bool {
        let amount = price.amount();
        let (lo, hi): (Option<i64>, Option<i64>) = match self {
            Self::Budget => (None, Some(200)),
            Self::Mid => (Some(200), Some(500)),
            Self::Premium => (Some(500), Some(1000)),
            Self::Luxury => (Some(1000), None),
        };
        lo.is_none_or(|lo| amount >= Decimal::from(lo))
            && hi.is_none_or(|hi| amount < Decimal::from(hi))
    }
}

/// Search filters for the product listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub category: Option<String>,
    pub animal_type: Option<String>,
    pub price: Option<PriceTier>,
}

impl SearchFilters {
    /// Check a product against a free-text query and these filters.
    ///
    /// The query matches case-insensitively against name and description.
    /// Category and animal type match exactly unless unset or [`ALL_FILTER`].
    #[must_use]
    pub fn matches(&self, query: &str, product: &Product) -> bool {
        let query = query.trim().to_lowercase();
        if !query.is_empty()
            && !product.name.to_lowercase().contains(&query)
            && !product.description.to_lowercase().contains(&query)
        {
            return false;
        }

        if !field_matches(self.category.as_deref(), product.category.as_deref()) {
            return false;
        }
        if !field_matches(self.animal_type.as_deref(), product.animal_type.as_deref()) {
            return false;
        }

        match self.price {
            Some(tier) => product.min_price().is_some_and(|p| tier.contains(p)),
            None => true,
        }
    }

    /// Apply to a list, keeping order.
    #[must_use]
    pub fn apply<'a>(&self, query: &str, products: &'a [Product]) -> Vec<&'a Product> {
        products.iter().filter(|p| self.matches(query, p)).collect()
    }
}

fn field_matches(filter: Option<&str>, value: Option<&str>) -> bool {
    match filter.map(str::trim) {
        None | Some("" | ALL_FILTER) => true,
        Some(wanted) => value == Some(wanted),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(name: &str, category: &str, animal: &str, prices: &[i64]) -> Product {
        Product {
            id: ProductId::new(name.to_lowercase()),
            name: name.to_string(),
            description: format!("{name} for happy pets"),
            image: None,
            category: Some(category.to_string()),
            animal_type: Some(animal.to_string()),
            options: prices
                .iter()
                .enumerate()
                .map(|(i, p)| ProductOption {
                    size: format!("S{i}"),
                    price: Price::from_whole(*p),
                    stock: 10,
                })
                .collect(),
        }
    }

    #[test]
    fn test_option_lookup() {
        let p = product("Kibble", "food", "dog", &[100, 300]);
        assert_eq!(p.option("S1").map(|o| o.price), Some(Price::from_whole(300)));
        assert!(p.option("XL").is_none());
    }

    #[test]
    fn test_query_matches_name_or_description() {
        let p = product("Kibble", "food", "dog", &[100]);
        let filters = SearchFilters::default();
        assert!(filters.matches("kib", &p));
        assert!(filters.matches("HAPPY", &p));
        assert!(!filters.matches("litter", &p));
        assert!(filters.matches("  ", &p));
    }

    #[test]
    fn test_all_sentinel_disables_filter() {
        let p = product("Kibble", "food", "dog", &[100]);
        let filters = SearchFilters {
            category: Some(ALL_FILTER.to_string()),
            animal_type: Some("cat".to_string()),
            price: None,
        };
        assert!(!filters.matches("", &p));

        let filters = SearchFilters {
            animal_type: Some(ALL_FILTER.to_string()),
            ..filters
        };
        assert!(filters.matches("", &p));
    }

    #[test]
    fn test_price_tier_uses_cheapest_option() {
        let p = product("Bed", "home", "cat", &[750, 199]);
        let tier = |t| SearchFilters {
            price: Some(t),
            ..SearchFilters::default()
        };
        assert!(tier(PriceTier::Budget).matches("", &p));
        assert!(!tier(PriceTier::Premium).matches("", &p));
    }

    #[test]
    fn test_price_tier_boundaries() {
        assert!(PriceTier::Mid.contains(Price::from_whole(200)));
        assert!(!PriceTier::Mid.contains(Price::from_whole(500)));
        assert!(PriceTier::Luxury.contains(Price::from_whole(1000)));
        assert!(!PriceTier::Budget.contains(Price::from_whole(200)));
    }

    #[test]
    fn test_price_tier_tokens() {
        for tier in [
            PriceTier::Budget,
            PriceTier::Mid,
            PriceTier::Premium,
            PriceTier::Luxury,
        ] {
            assert_eq!(PriceTier::from_token(tier.token()), Some(tier));
        }
        assert_eq!(PriceTier::from_token("$$"), None);
    }

    #[test]
    fn test_apply_keeps_order() {
        let products = vec![
            product("Kibble", "food", "dog", &[100]),
            product("Catnip", "toy", "cat", &[50]),
            product("Treats", "food", "dog", &[80]),
        ];
        let filters = SearchFilters {
            category: Some("food".to_string()),
            ..SearchFilters::default()
        };
        let names: Vec<_> = filters
            .apply("", &products)
            .into_iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Kibble", "Treats"]);
    }
}
