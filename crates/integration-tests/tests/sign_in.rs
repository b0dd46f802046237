//! Sign-in, sign-out and session verification against the mock backend.

#![allow(clippy::unwrap_used)]

use harvest_market_client::api::AuthError;
use harvest_market_client::session::User;
use harvest_market_client::storage::keys;
use harvest_market_integration_tests::{EMAIL, MockBackend, PASSWORD};
use secrecy::SecretString;

fn password(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

#[tokio::test]
async fn test_login_persists_session() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();

    let user = market.login(EMAIL, &password(PASSWORD)).await.unwrap();
    assert_eq!(user.email.as_str(), EMAIL);
    assert_eq!(user.display_name(), "Abena Boateng");

    assert!(market.session().is_authenticated());
    for key in keys::AUTH {
        assert!(market.storage().contains(key), "{key} should be stored");
    }
    let stored: User = market.storage().load(keys::USER).unwrap();
    assert_eq!(stored, user);

    // A context opened later over the same storage starts signed in.
    let other = market.open_context().unwrap();
    assert_eq!(other.user(), Some(user));
}

#[tokio::test]
async fn test_invalid_credentials() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();

    let err = market
        .login(EMAIL, &password("not-the-password"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials), "{err:?}");
    assert!(!market.session().is_authenticated());
    assert!(!market.storage().contains(keys::ACCESS_TOKEN));
}

#[tokio::test]
async fn test_verify_session_returns_profile() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();
    assert!(market.verify_session().await.unwrap().is_none());
    assert_eq!(backend.profile_calls(), 0);

    market.login(EMAIL, &password(PASSWORD)).await.unwrap();
    let profile = market.verify_session().await.unwrap().unwrap();
    assert!(profile.is_email_verified);
    assert_eq!(profile.default_address().unwrap().city, "Kumasi");
}

#[tokio::test]
async fn test_revoke_and_logout_clears_everything() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();
    market.login(EMAIL, &password(PASSWORD)).await.unwrap();

    let product = market
        .api()
        .product(harvest_market_core::CatalogId::new(3))
        .await
        .unwrap();
    market.add_to_cart(&product);
    market.save_for_later(&product);

    market.revoke_and_logout().await;

    assert_eq!(backend.logout_calls(), 1);
    assert!(!market.session().is_authenticated());
    assert!(market.cart().current().is_empty());
    assert!(market.wishlist().current().is_empty());
    for key in [
        keys::ACCESS_TOKEN,
        keys::REFRESH_TOKEN,
        keys::USER,
        keys::CART,
        keys::WISHLIST,
    ] {
        assert!(!market.storage().contains(key), "{key} should be cleared");
    }
}

#[tokio::test]
async fn test_logout_survives_backend_rejection() {
    let backend = MockBackend::start().await.unwrap();
    let market = backend.marketplace().unwrap();
    market.login(EMAIL, &password(PASSWORD)).await.unwrap();

    backend.expire_access_token();
    backend.reject_refresh();
    market.revoke_and_logout().await;

    assert_eq!(backend.logout_calls(), 0);
    assert!(!market.session().is_authenticated());
    assert!(!market.storage().contains(keys::ACCESS_TOKEN));
}
