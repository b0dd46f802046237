//! Backend HTTP client.
//!
//! Every request carries the session's bearer token and the configured
//! timeout. When the backend reports that the access token expired, the
//! client renews the credential pair once through `/token/refresh`, writes
//! the new pair back into the session and re-issues the original request
//! exactly once.
//!
//! # Concurrent refreshes
//!
//! Refreshes are serialized behind one async gate. Each request remembers
//! the credential generation it was sent with. A request that fails while
//! another one is refreshing waits on the gate and then either reuses the
//! renewed token or inherits the recorded failure, so a burst of expired
//! requests costs a single refresh call.

mod error;

pub use error::{ApiError, ErrorBody};

use std::sync::Arc;

use moka::future::Cache;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::api::cache::CacheValue;
use crate::config::ClientConfig;
use crate::session::{SessionAction, SessionStore, Tokens};

/// Backend path exchanging a refresh token for a new credential pair.
pub const REFRESH_PATH: &str = "/token/refresh";

/// Longest slice of an unexpected body kept in an error.
const SNIPPET_LEN: usize = 200;

/// A request to the backend API, independent of credentials.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    public: bool,
}

impl ApiRequest {
    /// Request with an explicit method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            public: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Encode` if `body` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        self.body = Some(serde_json::to_value(body).map_err(ApiError::Encode)?);
        Ok(self)
    }

    /// Append query parameters.
    #[must_use]
    pub fn query<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Mark the endpoint as not requiring a session.
    ///
    /// Public requests are sent without a bearer token and never trigger a
    /// token refresh, so a 401 from them (bad credentials at login, a
    /// rejected refresh token) is returned as is.
    #[must_use]
    pub const fn public(mut self) -> Self {
        self.public = true;
        self
    }

    /// Request path relative to the API root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }
}

/// Client for the marketplace backend.
///
/// Cheap to clone; clones share the connection pool, the session and the
/// refresh gate.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    session: SessionStore,
    /// Held while a refresh is in flight. Holds the generation whose refresh
    /// last failed.
    refresh_gate: Mutex<Option<u64>>,
    cache: Cache<String, CacheValue>,
}

/// Response of `/token/refresh`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl ApiClient {
    /// Create a client bound to `session`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Builder` if the TLS backend cannot be initialized.
    pub fn new(config: ClientConfig, session: SessionStore) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(ApiError::Builder)?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.product_cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                http,
                config,
                session,
                refresh_gate: Mutex::new(None),
                cache,
            }),
        })
    }

    /// The session this client authenticates with.
    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    /// Configuration the client was built with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn cache(&self) -> &Cache<String, CacheValue> {
        &self.inner.cache
    }

    /// Send a request and decode the JSON response.
    ///
    /// An empty success body decodes as JSON `null`, so `()` and `Option<_>`
    /// are valid targets for endpoints that return nothing.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` when the access token expired and
    /// could not be renewed; any other `ApiError` is the outcome of the
    /// (possibly retried) request.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        if request.public {
            return self.execute(&request, None).await;
        }

        let credentials = self.inner.session.credentials();
        match self.execute(&request, credentials.access.as_ref()).await {
            Err(e) if e.is_auth_expired() => {
                debug!(error = %e, "Access token rejected, refreshing");
                let access = self.refresh_after(credentials.generation).await?;
                self.execute(&request, Some(&access)).await
            }
            result => result,
        }
    }

    /// Renew the credential pair now, regardless of expiry.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` if there is no refresh token or the
    /// backend rejects it.
    pub async fn refresh_session(&self) -> Result<(), ApiError> {
        self.refresh_after(self.inner.session.generation()).await?;
        Ok(())
    }

    /// Obtain a usable access token after credentials of `seen_generation`
    /// were rejected.
    async fn refresh_after(&self, seen_generation: u64) -> Result<SecretString, ApiError> {
        let mut failed_generation = self.inner.refresh_gate.lock().await;

        let credentials = self.inner.session.credentials();
        if credentials.generation != seen_generation {
            // The session changed while we waited: another request already
            // refreshed, or the user signed in or out.
            return credentials.access.ok_or(ApiError::SessionExpired);
        }
        if *failed_generation == Some(seen_generation) {
            return Err(ApiError::SessionExpired);
        }

        let Some(refresh_token) = credentials.refresh else {
            warn!("Access token expired and no refresh token is available");
            *failed_generation = Some(seen_generation);
            return Err(ApiError::SessionExpired);
        };

        match self.request_refresh(&refresh_token).await {
            Ok(tokens) => {
                let access = tokens.access.clone();
                self.inner.session.dispatch(SessionAction::RotateTokens(tokens));
                *failed_generation = None;
                Ok(access)
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                *failed_generation = Some(seen_generation);
                Err(ApiError::SessionExpired)
            }
        }
    }

    #[instrument(skip_all)]
    async fn request_refresh(&self, refresh_token: &SecretString) -> Result<Tokens, ApiError> {
        let request = ApiRequest::post(REFRESH_PATH)
            .json(&serde_json::json!({ "refreshToken": refresh_token.expose_secret() }))?
            .public();
        let response: RefreshResponse = self.execute(&request, None).await?;
        debug!("Credentials renewed");
        Ok(Tokens::new(response.access_token, response.refresh_token))
    }

    /// Issue one HTTP exchange.
    async fn execute<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        access: Option<&SecretString>,
    ) -> Result<T, ApiError> {
        let url = self.inner.config.endpoint(&request.path);

        let mut builder = self
            .inner
            .http
            .request(request.method.clone(), &url)
            .header(ACCEPT, "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = access {
            builder = builder.bearer_auth(token.expose_secret());
        }

        let response = builder.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;

        if status.is_success() {
            debug!(status = status.as_u16(), "API request succeeded");
            decode_success(status, is_json, &body)
        } else {
            let error = ErrorBody::from_response(status, &body);
            warn!(
                status = error.status,
                code = %error.code,
                message = %error.message,
                "API request failed"
            );
            Err(ApiError::Status(error))
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.inner.config.request_timeout)
        } else {
            ApiError::Network(e)
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.api_base_url.as_str())
            .finish_non_exhaustive()
    }
}

fn decode_success<T: DeserializeOwned>(
    status: StatusCode,
    is_json: bool,
    body: &[u8],
) -> Result<T, ApiError> {
    let body = if body.iter().all(u8::is_ascii_whitespace) {
        b"null".as_slice()
    } else {
        body
    };

    serde_json::from_slice(body).map_err(|source| {
        if is_json || body == b"null" {
            ApiError::MalformedResponse {
                status: status.as_u16(),
                source,
            }
        } else {
            ApiError::NonJson {
                status: status.as_u16(),
                snippet: String::from_utf8_lossy(body).chars().take(SNIPPET_LEN).collect(),
            }
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Greeting {
        message: String,
    }

    #[test]
    fn test_decode_json_body() {
        let greeting: Greeting =
            decode_success(StatusCode::OK, true, br#"{"message":"hi"}"#).unwrap();
        assert_eq!(greeting.message, "hi");
    }

    #[test]
    fn test_empty_body_decodes_as_null() {
        decode_success::<()>(StatusCode::NO_CONTENT, false, b"").unwrap();
        let value: Option<Greeting> = decode_success(StatusCode::OK, true, b"  ").unwrap();
        assert!(value.is_none());
    }

    #[test]
    fn test_non_json_body() {
        let err = decode_success::<Greeting>(StatusCode::OK, false, b"<html>oops</html>")
            .unwrap_err();
        assert!(matches!(err, ApiError::NonJson { status: 200, ref snippet } if snippet.contains("oops")));
    }

    #[test]
    fn test_json_body_with_wrong_shape() {
        let err = decode_success::<Greeting>(StatusCode::OK, true, br#"{"msg":1}"#).unwrap_err();
        assert!(matches!(err, ApiError::MalformedResponse { status: 200, .. }));
    }

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("/products/")
            .query([("page", "2"), ("limit", "10")])
            .public();
        assert_eq!(request.path(), "/products/");
        assert_eq!(request.method(), &Method::GET);
        assert!(request.public);
        assert_eq!(request.query.len(), 2);

        let request = ApiRequest::post("/auth/login")
            .json(&serde_json::json!({"email": "a@b.co"}))
            .unwrap();
        assert_eq!(request.body.unwrap()["email"], "a@b.co");
    }
}
