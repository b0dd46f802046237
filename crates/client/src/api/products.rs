//! Catalog endpoints.
//!
//! Product details and unfiltered listing pages are cached in memory for the
//! configured TTL (5 minutes by default). Filtered or searched listings always
//! go to the backend.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use harvest_market_core::{CatalogId, Price};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::cache::{self, CacheValue};
use crate::cart::NewCartItem;
use crate::http::{ApiClient, ApiError, ApiRequest};

/// Field a product listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    Name,
    Price,
    CreatedAt,
    StockQuantity,
}

impl SortKey {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::CreatedAt => "createdAt",
            Self::StockQuantity => "stockQuantity",
        }
    }
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "name" => Ok(Self::Name),
            "price" => Ok(Self::Price),
            "createdat" | "newest" => Ok(Self::CreatedAt),
            "stockquantity" | "stock" => Ok(Self::StockQuantity),
            _ => Err(format!("unknown sort key: {s}")),
        }
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err(format!("unknown sort direction: {s}")),
        }
    }
}

/// Filters, paging and ordering for a product listing.
///
/// Unset fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<SortKey>,
    pub sort_dir: Option<SortDirection>,
}

impl ProductQuery {
    /// Query string parameters, named as the backend expects them.
    #[must_use]
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(category) = &self.category {
            params.push(("category", category.clone()));
        }
        if let Some(is_active) = self.is_active {
            params.push(("isActive", is_active.to_string()));
        }
        if let Some(min) = self.min_price {
            params.push(("minPrice", min.amount().normalize().to_string()));
        }
        if let Some(max) = self.max_price {
            params.push(("maxPrice", max.amount().normalize().to_string()));
        }
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(sort_by) = self.sort_by {
            params.push(("sortBy", sort_by.as_str().to_string()));
        }
        if let Some(sort_dir) = self.sort_dir {
            params.push(("sortDir", sort_dir.as_str().to_string()));
        }
        params
    }

    /// Whether only paging is set, making the result safe to share.
    fn is_unfiltered(&self) -> bool {
        Self {
            page: None,
            limit: None,
            ..self.clone()
        } == Self::default()
    }
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetails {
    pub id: CatalogId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub price: Price,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default)]
    pub images_urls: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

const fn default_active() -> bool {
    true
}

impl ProductDetails {
    /// Whether the product can be bought right now.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.is_active && self.stock_quantity > 0
    }

    /// Cart line for this product, using the first image.
    #[must_use]
    pub fn to_cart_item(&self) -> NewCartItem {
        NewCartItem {
            id: self.id.into(),
            title: self.name.clone(),
            price: self.price,
            image: self.images_urls.first().cloned().unwrap_or_default(),
        }
    }
}

impl fmt::Display for ProductDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.price, self.currency)
    }
}

/// Paging metadata of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

/// One page of products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductListResponse {
    pub data: Vec<ProductDetails>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl ApiClient {
    /// List products.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn list_products(&self, query: &ProductQuery) -> Result<ProductListResponse, ApiError> {
        let cache_key = query.is_unfiltered().then(|| cache::listing_key(query));
        if let Some(key) = &cache_key
            && let Some(CacheValue::Products(listing)) = self.cache().get(key).await
        {
            debug!("Product listing cache hit");
            return Ok(listing);
        }

        let request = ApiRequest::get("/products").query(query.to_params()).public();
        let listing: ProductListResponse = self.send(request).await?;

        if let Some(key) = cache_key {
            self.cache()
                .insert(key, CacheValue::Products(listing.clone()))
                .await;
        }
        Ok(listing)
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails; a missing product is
    /// `ApiError::Status` with status 404.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: CatalogId) -> Result<ProductDetails, ApiError> {
        let key = cache::product_key(id);
        if let Some(CacheValue::Product(product)) = self.cache().get(&key).await {
            debug!("Product cache hit");
            return Ok(*product);
        }

        let product: ProductDetails = self
            .send::<super::MaybeWrapped<ProductDetails>>(
                ApiRequest::get(format!("/products/{id}")).public(),
            )
            .await?
            .into_inner();

        self.cache()
            .insert(key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// Drop a cached product so the next read goes to the backend.
    pub async fn invalidate_product(&self, id: CatalogId) {
        self.cache().invalidate(&cache::product_key(id)).await;
    }

    /// Drop every cached catalog response.
    pub async fn invalidate_catalog(&self) {
        self.cache().invalidate_all();
        self.cache().run_pending_tasks().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_params_skip_unset_fields() {
        assert!(ProductQuery::default().to_params().is_empty());

        let query = ProductQuery {
            category: Some("grains".to_string()),
            min_price: Some(Price::from_units(10)),
            page: Some(2),
            sort_by: Some(SortKey::CreatedAt),
            sort_dir: Some(SortDirection::Desc),
            ..ProductQuery::default()
        };
        assert_eq!(
            query.to_params(),
            vec![
                ("category", "grains".to_string()),
                ("minPrice", "10".to_string()),
                ("page", "2".to_string()),
                ("sortBy", "createdAt".to_string()),
                ("sortDir", "desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_unfiltered_queries() {
        assert!(ProductQuery::default().is_unfiltered());
        let paged = ProductQuery {
            page: Some(3),
            limit: Some(12),
            ..ProductQuery::default()
        };
        assert!(paged.is_unfiltered());
        let searched = ProductQuery {
            search: Some("maize".to_string()),
            ..paged
        };
        assert!(!searched.is_unfiltered());
    }

    #[test]
    fn test_product_wire_format() {
        let product: ProductDetails = serde_json::from_str(
            r#"{"id":15,"name":"Yellow Maize","description":"50kg bag","category":"grains",
                "price":450.5,"currency":"GHS","stockQuantity":12,
                "imagesUrls":["https://img/maize.jpg"],"isActive":true,
                "createdAt":"2024-02-01T08:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(product.id, CatalogId::new(15));
        assert_eq!(product.price.to_string(), "450.50");
        assert!(product.is_available());

        let item = product.to_cart_item();
        assert_eq!(item.id.as_str(), "15");
        assert_eq!(item.image, "https://img/maize.jpg");
    }

    #[test]
    fn test_sparse_product_uses_defaults() {
        let product: ProductDetails =
            serde_json::from_str(r#"{"id":1,"name":"Goat","price":900}"#).unwrap();
        assert!(product.is_active);
        assert!(!product.is_available());
        assert!(product.to_cart_item().image.is_empty());
    }

    #[test]
    fn test_listing_without_pagination() {
        let listing: ProductListResponse =
            serde_json::from_str(r#"{"data":[{"id":1,"name":"Yam","price":20}]}"#).unwrap();
        assert_eq!(listing.data.len(), 1);
        assert_eq!(listing.pagination, Pagination::default());
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("price".parse::<SortKey>().unwrap(), SortKey::Price);
        assert_eq!("created-at".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("weight".parse::<SortKey>().is_err());
    }
}
