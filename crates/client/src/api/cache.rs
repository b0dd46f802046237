//! Cache types for catalog responses.

use harvest_market_core::CatalogId;

use super::products::{ProductDetails, ProductListResponse, ProductQuery};

/// Cache key for a product detail.
pub fn product_key(id: CatalogId) -> String {
    format!("product:{id}")
}

/// Cache key for an unfiltered listing page. Unset and explicit paging
/// values send different query strings, so they get different keys.
pub fn listing_key(query: &ProductQuery) -> String {
    format!("products:{:?}:{:?}", query.page, query.limit)
}

/// Cached value types.
#[derive(Debug, Clone)]
pub enum CacheValue {
    Product(Box<ProductDetails>),
    Products(ProductListResponse),
}
