//! Integration tests for Harvest Market.
//!
//! The tests drive a real [`Marketplace`] against [`MockBackend`], an axum
//! server bound to an ephemeral local port that mimics the marketplace
//! backend closely enough to exercise sign-in, token refresh, structured
//! errors and timeouts.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p harvest-market-integration-tests
//! ```
//!
//! # Mock Backend
//!
//! The backend accepts one account ([`EMAIL`] / [`PASSWORD`]). Each token
//! refresh issues a new pair and invalidates the old access token. Tests can
//! expire the current access token, make refreshes fail, slow refreshes down
//! to force concurrent requests to overlap, or sign in without a refresh
//! token.
//!
//! A few account endpoints misbehave on purpose: `/shop/rewards` reports an
//! expired token with 403, `/shop/promotions/apply` always rejects the code
//! as expired, and `/shop/locked` answers 401 to everyone.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, RawQuery, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use harvest_market_client::{ClientConfig, ClientError, ConfigError, Marketplace, Storage};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

/// Email of the account the mock backend knows.
pub const EMAIL: &str = "abena@harvest.market";

/// Password of the account the mock backend knows.
pub const PASSWORD: &str = "cassava-2026";

/// Order id the mock backend answers with a 404.
pub const MISSING_ORDER_ID: i64 = 404;

/// How long `/slow` takes to answer.
pub const SLOW_RESPONSE: Duration = Duration::from_secs(2);

#[derive(Default)]
struct MockState {
    serial: AtomicUsize,
    /// Access token the backend currently accepts.
    access_token: Mutex<String>,
    /// Refresh token the backend currently accepts; `None` rejects all.
    refresh_token: Mutex<Option<String>>,
    refresh_delay: Mutex<Duration>,
    /// Sign in without handing out a refresh token.
    omit_refresh_token: AtomicBool,
    last_product_query: Mutex<Option<String>>,
    refresh_calls: AtomicUsize,
    profile_calls: AtomicUsize,
    product_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    rewards_calls: AtomicUsize,
    promotion_calls: AtomicUsize,
    locked_calls: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockState {
    /// Issue a fresh token pair and make it the only accepted one.
    fn issue_tokens(&self) -> (String, String) {
        let n = self.serial.fetch_add(1, Ordering::SeqCst) + 1;
        let access = format!("access-{n}");
        let refresh = format!("refresh-{n}");
        *lock(&self.access_token) = access.clone();
        *lock(&self.refresh_token) = Some(refresh.clone());
        (access, refresh)
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "));
        bearer.is_some_and(|token| *lock(&self.access_token) == token)
    }
}

/// A running mock backend. The server stops when this is dropped.
pub struct MockBackend {
    addr: SocketAddr,
    state: Arc<MockState>,
    server: JoinHandle<()>,
}

impl MockBackend {
    /// Bind to an ephemeral port on 127.0.0.1 and start serving.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start() -> std::io::Result<Self> {
        let state = Arc::new(MockState::default());
        let app = router(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            state,
            server,
        })
    }

    /// API root to configure the client with.
    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    /// Client configuration pointing at this backend.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base URL is rejected.
    pub fn config(&self) -> Result<ClientConfig, ConfigError> {
        ClientConfig::for_base_url(&self.base_url())
    }

    /// A marketplace over fresh in-memory storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn marketplace(&self) -> Result<Marketplace, ClientError> {
        Marketplace::new(self.config()?, Storage::in_memory())
    }

    /// Stop accepting the access token the client holds.
    pub fn expire_access_token(&self) {
        let n = self.state.serial.fetch_add(1, Ordering::SeqCst) + 1;
        *lock(&self.state.access_token) = format!("expired-{n}");
    }

    /// Reject every refresh from now on.
    pub fn reject_refresh(&self) {
        *lock(&self.state.refresh_token) = None;
    }

    /// Answer later sign-ins without a refresh token.
    pub fn omit_refresh_token(&self) {
        self.state.omit_refresh_token.store(true, Ordering::SeqCst);
    }

    /// Hold each refresh response for `delay`.
    pub fn set_refresh_delay(&self, delay: Duration) {
        *lock(&self.state.refresh_delay) = delay;
    }

    #[must_use]
    pub fn refresh_calls(&self) -> usize {
        self.state.refresh_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn profile_calls(&self) -> usize {
        self.state.profile_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn product_calls(&self) -> usize {
        self.state.product_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn logout_calls(&self) -> usize {
        self.state.logout_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn rewards_calls(&self) -> usize {
        self.state.rewards_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn promotion_calls(&self) -> usize {
        self.state.promotion_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn locked_calls(&self) -> usize {
        self.state.locked_calls.load(Ordering::SeqCst)
    }

    /// Raw query string of the last product listing request.
    #[must_use]
    pub fn last_product_query(&self) -> Option<String> {
        lock(&self.state.last_product_query).clone()
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn router(state: Arc<MockState>) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/token/refresh", post(refresh))
        .route("/api/logout", post(logout))
        .route("/api/shop/customers/me", get(profile))
        .route("/api/shop/rewards", get(rewards))
        .route("/api/shop/promotions/apply", post(apply_promotion))
        .route("/api/shop/locked", get(locked))
        .route("/api/orders", get(orders))
        .route("/api/orders/{id}", get(order))
        .route("/api/products", get(products))
        .route("/api/products/{id}", get(product))
        .route("/api/slow", get(slow))
        .route("/api/maintenance", get(maintenance))
        .with_state(state)
}

fn error(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(json!({ "error": { "code": code, "message": message } })),
    )
        .into_response()
}

fn token_expired() -> Response {
    error(
        StatusCode::UNAUTHORIZED,
        "TOKEN_EXPIRED",
        "Access token has expired",
    )
}

async fn login(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    let email = body.get("email").and_then(Value::as_str).unwrap_or_default();
    let password = body.get("password").and_then(Value::as_str).unwrap_or_default();
    if email != EMAIL || password != PASSWORD {
        return error(
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
            "Invalid email or password",
        );
    }

    let (access, mut refresh) = state.issue_tokens();
    if state.omit_refresh_token.load(Ordering::SeqCst) {
        *lock(&state.refresh_token) = None;
        refresh = String::new();
    }
    Json(json!({
        "accessToken": access,
        "refreshToken": refresh,
        "expiresAt": "2026-10-18T12:00:00Z",
        "addresses": true,
        "user": {
            "email": EMAIL,
            "firstName": "Abena",
            "lastName": "Boateng",
            "phone": "0241234567",
            "userType": "AGENT",
            "status": "ACTIVE"
        }
    }))
    .into_response()
}

async fn refresh(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *lock(&state.refresh_delay);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let presented = body.get("refreshToken").and_then(Value::as_str).unwrap_or_default();
    let accepted = lock(&state.refresh_token).as_deref() == Some(presented);
    if !accepted {
        return error(
            StatusCode::UNAUTHORIZED,
            "REFRESH_TOKEN_INVALID",
            "Refresh token is invalid",
        );
    }

    let (access, refresh) = state.issue_tokens();
    Json(json!({ "accessToken": access, "refreshToken": refresh })).into_response()
}

async fn logout(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return token_expired();
    }
    state.logout_calls.fetch_add(1, Ordering::SeqCst);
    StatusCode::NO_CONTENT.into_response()
}

async fn profile(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.profile_calls.fetch_add(1, Ordering::SeqCst);
    if !state.authorized(&headers) {
        return token_expired();
    }
    Json(json!({
        "data": {
            "id": 7,
            "firstName": "Abena",
            "lastName": "Boateng",
            "email": EMAIL,
            "phoneNumber": "0241234567",
            "isEmailVerified": true,
            "addresses": [{
                "id": 1,
                "street": "12 Market Road",
                "city": "Kumasi",
                "region": "Ashanti",
                "postalCode": "AK-039",
                "country": "Ghana",
                "isDefault": true
            }],
            "recentOrders": []
        }
    }))
    .into_response()
}

async fn rewards(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.rewards_calls.fetch_add(1, Ordering::SeqCst);
    if !state.authorized(&headers) {
        return error(
            StatusCode::FORBIDDEN,
            "ACCESS_TOKEN_EXPIRED",
            "Access token has expired",
        );
    }
    Json(json!({ "points": 120 })).into_response()
}

async fn apply_promotion(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    state.promotion_calls.fetch_add(1, Ordering::SeqCst);
    if !state.authorized(&headers) {
        return token_expired();
    }
    error(
        StatusCode::BAD_REQUEST,
        "PROMO_CODE_EXPIRED",
        "This promotion has ended",
    )
}

async fn locked(State(state): State<Arc<MockState>>) -> Response {
    state.locked_calls.fetch_add(1, Ordering::SeqCst);
    error(
        StatusCode::UNAUTHORIZED,
        "UNAUTHORIZED",
        "Account is locked",
    )
}

fn remote_order(id: i64) -> Value {
    json!({
        "id": id,
        "orderNumber": format!("HM-{id:04}"),
        "orderDate": "2026-09-30T09:15:00Z",
        "totalAmount": 181.0,
        "status": "PROCESSING",
        "items": [
            { "productId": 1, "productName": "White maize", "quantity": 2, "unitPrice": 90.5 }
        ]
    })
}

async fn orders(State(state): State<Arc<MockState>>, headers: HeaderMap) -> Response {
    if !state.authorized(&headers) {
        return token_expired();
    }
    Json(json!({ "data": [remote_order(1), remote_order(2)] })).into_response()
}

async fn order(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Response {
    if !state.authorized(&headers) {
        return token_expired();
    }
    if id == MISSING_ORDER_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": { "code": "ORDER_NOT_FOUND", "message": "Order not found" },
                "details": { "orderId": id }
            })),
        )
            .into_response();
    }
    Json(remote_order(id)).into_response()
}

fn catalog_entry(id: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Product {id}"),
        "description": "Locally grown",
        "category": "grains",
        "price": 90.5,
        "currency": "GHS",
        "stockQuantity": 25,
        "imagesUrls": [format!("https://cdn.harvest.market/{id}.jpg")],
        "isActive": true
    })
}

async fn products(State(state): State<Arc<MockState>>, RawQuery(query): RawQuery) -> Response {
    state.product_calls.fetch_add(1, Ordering::SeqCst);
    *lock(&state.last_product_query) = query;
    Json(json!({
        "data": [catalog_entry(1), catalog_entry(2)],
        "pagination": { "page": 1, "limit": 20, "totalItems": 2, "totalPages": 1 }
    }))
    .into_response()
}

async fn product(State(state): State<Arc<MockState>>, Path(id): Path<i64>) -> Response {
    state.product_calls.fetch_add(1, Ordering::SeqCst);
    Json(catalog_entry(id)).into_response()
}

async fn slow() -> Response {
    tokio::time::sleep(SLOW_RESPONSE).await;
    Json(json!({ "ok": true })).into_response()
}

async fn maintenance() -> Response {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/html")],
        "<html><body>Down for maintenance</body></html>",
    )
        .into_response()
}
