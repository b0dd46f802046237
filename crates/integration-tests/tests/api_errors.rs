//! Error classification of backend responses.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use harvest_market_client::{ApiError, ApiRequest, Marketplace, Storage};
use harvest_market_core::RemoteOrderId;
use harvest_market_integration_tests::{EMAIL, MISSING_ORDER_ID, MockBackend, PASSWORD};
use secrecy::SecretString;

#[tokio::test]
async fn test_structured_error_body() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();
    market
        .login(EMAIL, &SecretString::from(PASSWORD.to_string()))
        .await
        .unwrap();

    let err = market
        .api()
        .order(RemoteOrderId::new(MISSING_ORDER_ID))
        .await
        .unwrap_err();

    let ApiError::Status(body) = &err else {
        panic!("expected a status error, got {err:?}");
    };
    assert_eq!(body.status, 404);
    assert_eq!(body.code, "ORDER_NOT_FOUND");
    assert_eq!(body.message, "Order not found");
    assert_eq!(
        body.details,
        Some(serde_json::json!({ "orderId": MISSING_ORDER_ID }))
    );
    assert_eq!(err.status(), Some(404));
    assert!(!err.is_auth_expired());
    assert_eq!(err.to_string(), "ORDER_NOT_FOUND (HTTP 404): Order not found");
}

#[tokio::test]
async fn test_non_json_body() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();

    let err = market
        .api()
        .send::<serde_json::Value>(ApiRequest::get("/maintenance").public())
        .await
        .unwrap_err();

    match err {
        ApiError::NonJson { status, snippet } => {
            assert_eq!(status, 200);
            assert!(snippet.contains("Down for maintenance"), "{snippet}");
        }
        other => panic!("expected a non-JSON error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unknown_route_falls_back_to_status_code() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();

    let err = market
        .api()
        .send::<serde_json::Value>(ApiRequest::get("/nowhere").public())
        .await
        .unwrap_err();

    let ApiError::Status(body) = err else {
        panic!("expected a status error");
    };
    assert_eq!(body.code, "HTTP_404");
    assert_eq!(body.message, "Not Found");
}

#[tokio::test]
async fn test_slow_backend_times_out() {
    let backend = MockBackend::start().await.unwrap();
    let config = backend
        .config()
        .unwrap()
        .with_request_timeout(Duration::from_millis(200));
    let market = Marketplace::new(config, Storage::in_memory()).unwrap();

    let err = market
        .api()
        .send::<serde_json::Value>(ApiRequest::get("/slow").public())
        .await
        .unwrap_err();

    assert!(
        matches!(err, ApiError::Timeout(limit) if limit == Duration::from_millis(200)),
        "{err:?}"
    );
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_error() {
    let backend = MockBackend::start().await.unwrap();
    let config = backend.config().unwrap();
    drop(backend);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let market = Marketplace::new(config, Storage::in_memory()).unwrap();
    let err = market
        .api()
        .list_products(&Default::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Network(_)), "{err:?}");
    assert!(err.is_transport());
}
