//! Token refresh against the mock backend.
//!
//! An expired access token is renewed once and the request retried. A failed
//! renewal surfaces as an expired session and concurrent failures share one
//! renewal. Domain errors that merely mention expiry are returned untouched.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use harvest_market_client::storage::keys;
use harvest_market_client::{ApiError, ApiRequest, Marketplace};
use harvest_market_integration_tests::{EMAIL, MockBackend, PASSWORD};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tokio::task::JoinSet;

async fn signed_in(backend: &MockBackend) -> Marketplace {
    let market = backend.marketplace().unwrap();
    market
        .login(EMAIL, &SecretString::from(PASSWORD.to_string()))
        .await
        .unwrap();
    market
}

fn access_token(market: &Marketplace) -> String {
    market
        .session()
        .credentials()
        .access
        .unwrap()
        .expose_secret()
        .to_string()
}

#[tokio::test]
async fn test_valid_token_needs_no_refresh() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;

    let profile = market.api().profile().await.unwrap();
    assert_eq!(profile.email, EMAIL);
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(backend.profile_calls(), 1);
}

#[tokio::test]
async fn test_expired_token_is_refreshed_and_request_retried() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;
    let before = access_token(&market);

    backend.expire_access_token();
    let profile = market.api().profile().await.unwrap();

    assert_eq!(profile.first_name, "Abena");
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.profile_calls(), 2);

    let after = access_token(&market);
    assert_ne!(after, before);
    assert_eq!(
        market.storage().load::<String>(keys::ACCESS_TOKEN),
        Some(after)
    );
    assert!(market.storage().contains(keys::REFRESH_TOKEN));
}

#[tokio::test]
async fn test_failed_refresh_reports_expired_session() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;

    backend.expire_access_token();
    backend.reject_refresh();

    let err = market.api().profile().await.unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired), "{err:?}");
    assert_eq!(backend.refresh_calls(), 1);

    // The rejected credentials are not offered for renewal again.
    let err = market.api().orders().await.unwrap_err();
    assert!(matches!(err, ApiError::SessionExpired), "{err:?}");
    assert_eq!(backend.refresh_calls(), 1);
}

#[tokio::test]
async fn test_concurrent_expiries_share_one_refresh() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;

    backend.set_refresh_delay(Duration::from_millis(200));
    backend.expire_access_token();

    let mut requests = JoinSet::new();
    for _ in 0..5 {
        let api = market.api().clone();
        requests.spawn(async move { api.profile().await });
    }
    while let Some(result) = requests.join_next().await {
        result.unwrap().unwrap();
    }

    assert_eq!(backend.refresh_calls(), 1);
    assert!(market.session().is_authenticated());
}

#[tokio::test]
async fn test_verify_session_signs_out_when_refresh_fails() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;

    backend.expire_access_token();
    backend.reject_refresh();

    assert!(market.verify_session().await.unwrap().is_none());
    assert!(!market.session().is_authenticated());
    for key in keys::AUTH {
        assert!(!market.storage().contains(key), "{key} should be cleared");
    }
}

#[tokio::test]
async fn test_public_requests_never_refresh() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;
    backend.expire_access_token();

    let listing = market.api().list_products(&Default::default()).await.unwrap();
    assert_eq!(listing.data.len(), 2);

    let err = market
        .login(EMAIL, &SecretString::from("wrong-password".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        harvest_market_client::api::AuthError::InvalidCredentials
    ));
    assert_eq!(backend.refresh_calls(), 0);
}

#[tokio::test]
async fn test_missing_refresh_token_expires_session_without_refreshing() {
    let backend = MockBackend::start().await.unwrap();
    backend.omit_refresh_token();
    let market = signed_in(&backend).await;
    assert!(market.session().credentials().refresh.is_none());

    backend.expire_access_token();
    let err = market.api().profile().await.unwrap_err();

    assert!(matches!(err, ApiError::SessionExpired), "{err:?}");
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(backend.profile_calls(), 1);
}

#[tokio::test]
async fn test_retried_request_is_not_retried_again() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;

    let err = market
        .api()
        .send::<Value>(ApiRequest::get("/shop/locked"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(err.to_string().contains("Account is locked"), "{err}");
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.locked_calls(), 2);
}

#[tokio::test]
async fn test_expiry_code_without_401_triggers_refresh() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;

    backend.expire_access_token();
    let rewards: Value = market
        .api()
        .send(ApiRequest::get("/shop/rewards"))
        .await
        .unwrap();

    assert_eq!(rewards["points"], 120);
    assert_eq!(backend.refresh_calls(), 1);
    assert_eq!(backend.rewards_calls(), 2);
}

#[tokio::test]
async fn test_domain_expiry_error_is_returned_without_refresh() {
    let backend = MockBackend::start().await.unwrap();
    let market = signed_in(&backend).await;
    let before = access_token(&market);

    let request = ApiRequest::post("/shop/promotions/apply")
        .json(&serde_json::json!({ "code": "HARVEST10" }))
        .unwrap();
    let err = market.api().send::<Value>(request).await.unwrap_err();

    let ApiError::Status(body) = err else {
        panic!("expected a status error, got {err:?}");
    };
    assert_eq!(body.code, "PROMO_CODE_EXPIRED");
    assert_eq!(body.status, 400);
    assert_eq!(backend.refresh_calls(), 0);
    assert_eq!(backend.promotion_calls(), 1);
    assert_eq!(access_token(&market), before);
}
