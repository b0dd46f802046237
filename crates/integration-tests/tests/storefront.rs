//! Catalog browsing, cart and checkout against the mock backend.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use harvest_market_client::api::{ProductQuery, SortDirection, SortKey};
use harvest_market_client::checkout::{CheckoutStep, PaymentDetails};
use harvest_market_client::orders::TrackQuery;
use harvest_market_core::{CatalogId, OrderStatus, Price, ProductId};
use harvest_market_integration_tests::{EMAIL, MockBackend, PASSWORD};
use secrecy::SecretString;

#[tokio::test]
async fn test_listing_sends_filters_as_query_string() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();

    let query = ProductQuery {
        category: Some("grains".to_string()),
        search: Some("white maize".to_string()),
        sort_by: Some(SortKey::Price),
        sort_dir: Some(SortDirection::Desc),
        page: Some(2),
        ..ProductQuery::default()
    };
    let listing = market.api().list_products(&query).await.unwrap();
    assert_eq!(listing.data.len(), 2);
    assert_eq!(listing.pagination.total_items, 2);

    let sent = backend.last_product_query().unwrap();
    for expected in [
        "category=grains",
        "search=white+maize",
        "sortBy=price",
        "sortDir=desc",
        "page=2",
    ] {
        assert!(sent.contains(expected), "{expected} missing from {sent}");
    }
}

#[tokio::test]
async fn test_product_details_are_cached() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();
    let id = CatalogId::new(5);

    let first = market.api().product(id).await.unwrap();
    let second = market.api().product(id).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(backend.product_calls(), 1);

    market.api().invalidate_product(id).await;
    market.api().product(id).await.unwrap();
    assert_eq!(backend.product_calls(), 2);
}

#[tokio::test]
async fn test_browse_to_checkout() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();

    let maize = market.api().product(CatalogId::new(1)).await.unwrap();
    let beans = market.api().product(CatalogId::new(2)).await.unwrap();
    market.add_to_cart(&maize);
    market.add_to_cart(&maize);
    let cart = market.add_to_cart(&beans);
    assert_eq!(cart.total_items(), 3);
    assert_eq!(cart.get(&ProductId::new("1")).unwrap().quantity, 2);

    let payment = PaymentDetails::CreditCard {
        card_number: SecretString::from("4111111111111111".to_string()),
        card_name: "Abena Boateng".to_string(),
        expiry_date: "08/28".to_string(),
        cvv: SecretString::from("123".to_string()),
    };
    assert!(market.checkout(None, &payment).is_err());
    assert_eq!(market.cart().current().total_items(), 3);

    market
        .login(EMAIL, &SecretString::from(PASSWORD.to_string()))
        .await
        .unwrap();
    let order = market.checkout(None, &payment).unwrap();

    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.total, maize.price.times(3));
    assert_ne!(order.total, Price::ZERO);
    assert!(order.order_number.starts_with("ORD-"));
    assert!(order.tracking_number.starts_with("TRK-"));
    assert!(market.cart().current().is_empty());
    assert_eq!(market.checkout_flow().step, CheckoutStep::Confirmation);

    let found = market
        .track(&TrackQuery {
            order_number: Some(order.order_number.to_lowercase()),
            tracking_number: None,
        })
        .unwrap();
    assert_eq!(found, order);
}

#[tokio::test]
async fn test_remote_orders_are_unwrapped() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();
    market
        .login(EMAIL, &SecretString::from(PASSWORD.to_string()))
        .await
        .unwrap();

    let orders = market.api().orders().await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].order_number, "HM-0001");
    assert_eq!(orders[0].items[0].quantity, 2);
}
