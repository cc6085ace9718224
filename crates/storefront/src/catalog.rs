//! Product catalog access.
//!
//! Stock validation always reads fresh products; display lookups (cart
//! rendering) and the filter lists go through a `moka` cache with a
//! 5-minute TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use pethub_core::{ALL_FILTER, Product, ProductId, SearchFilters};
use tracing::{debug, instrument};

use crate::api::types::{ProductDto, ProductList, SearchQuery};
use crate::api::{ApiClient, ApiError, conversions, segment};
use crate::error::CartError;

/// Read-only view of the product catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch a product with live stock.
    async fn get_product(&self, id: &ProductId) -> Result<Product, CartError>;

    /// Fetch a product for display. May be served from a cache, so stock
    /// figures can be stale.
    async fn get_product_display(&self, id: &ProductId) -> Result<Product, CartError> {
        self.get_product(id).await
    }

    /// Search by free text and filters.
    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Product>, CartError>;

    /// Category names for the filter list.
    async fn categories(&self) -> Result<Vec<String>, CartError>;

    /// Animal type names for the filter list.
    async fn animal_types(&self) -> Result<Vec<String>, CartError>;
}

#[derive(Clone)]
enum CacheValue {
    Product(Box<Product>),
    Names(Vec<String>),
}

/// [`ProductCatalog`] over the PetHub REST API.
#[derive(Clone)]
pub struct HttpCatalog {
    inner: Arc<HttpCatalogInner>,
}

struct HttpCatalogInner {
    api: ApiClient,
    cache: Cache<String, CacheValue>,
}

impl HttpCatalog {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Self {
            inner: Arc::new(HttpCatalogInner { api, cache }),
        }
    }

    async fn fetch_product(&self, id: &ProductId) -> Result<Product, CartError> {
        let api = &self.inner.api;
        let dto: ProductDto = api
            .get_json(&format!("/admin/products/{}", segment(id.as_str())))
            .await?;
        conversions::convert_product(dto, Some(id), |f| api.upload_url(f))
            .ok_or_else(|| CartError::Network(ApiError::NotFound(id.to_string())))
    }

    async fn names(&self, path: &str) -> Result<Vec<String>, CartError> {
        let cache_key = format!("names:{path}");
        if let Some(CacheValue::Names(names)) = self.inner.cache.get(&cache_key).await {
            debug!(path, "Cache hit for filter list");
            return Ok(names);
        }

        let names: Vec<String> = self.inner.api.get_json(path).await?;
        self.inner
            .cache
            .insert(cache_key, CacheValue::Names(names.clone()))
            .await;
        Ok(names)
    }

    /// Invalidate a cached product.
    pub async fn invalidate_product(&self, id: &ProductId) {
        self.inner.cache.invalidate(&format!("product:{id}")).await;
    }
}

/// Send a blank filter as the backend's "all" sentinel.
fn filter_param(value: Option<&str>) -> &str {
    match value.map(str::trim) {
        None | Some("") => ALL_FILTER,
        Some(v) => v,
    }
}

#[async_trait]
impl ProductCatalog for HttpCatalog {
    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: &ProductId) -> Result<Product, CartError> {
        let product = self.fetch_product(id).await?;
        self.inner
            .cache
            .insert(
                format!("product:{id}"),
                CacheValue::Product(Box::new(product.clone())),
            )
            .await;
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product_display(&self, id: &ProductId) -> Result<Product, CartError> {
        if let Some(CacheValue::Product(product)) =
            self.inner.cache.get(&format!("product:{id}")).await
        {
            debug!("Cache hit for product");
            return Ok(*product);
        }
        self.get_product(id).await
    }

    #[instrument(skip(self, filters))]
    async fn search(&self, query: &str, filters: &SearchFilters) -> Result<Vec<Product>, CartError> {
        let params = SearchQuery {
            q: query.trim(),
            category: filter_param(filters.category.as_deref()),
            animal_type: filter_param(filters.animal_type.as_deref()),
            price: filters.price.map_or("", |tier| tier.token()),
        };
        let api = &self.inner.api;
        let list: ProductList = api.get_json_with_query("/products/search", &params).await?;

        let products: Vec<Product> = list
            .into_vec()
            .into_iter()
            .filter_map(|dto| conversions::convert_product(dto, None, |f| api.upload_url(f)))
            .collect();
        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    async fn categories(&self) -> Result<Vec<String>, CartError> {
        self.names("/products/categories/list").await
    }

    async fn animal_types(&self) -> Result<Vec<String>, CartError> {
        self.names("/products/animal-types/list").await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pethub_core::PriceTier;

    use super::*;
    use crate::testing::InMemoryBackend;

    #[test]
    fn test_blank_filter_becomes_all() {
        assert_eq!(filter_param(None), ALL_FILTER);
        assert_eq!(filter_param(Some("  ")), ALL_FILTER);
        assert_eq!(filter_param(Some("dog")), "dog");
    }

    #[tokio::test]
    async fn test_display_lookup_defaults_to_fresh_lookup() {
        let catalog = InMemoryBackend::new().with_product("p1", &[("M", 100, 3)]);
        let product = catalog
            .get_product_display(&ProductId::new("p1"))
            .await
            .unwrap();
        assert_eq!(product.option("M").unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_in_memory_search_applies_filters() {
        let catalog = InMemoryBackend::new()
            .with_product("kibble", &[("2kg", 150, 3)])
            .with_product("bed", &[("L", 1200, 1)]);
        let filters = SearchFilters {
            price: Some(PriceTier::Luxury),
            ..SearchFilters::default()
        };
        let found = catalog.search("", &filters).await.unwrap();
        let ids: Vec<_> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["bed"]);
    }
}
