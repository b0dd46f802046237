//! Authentication endpoints.
//!
//! Everything here except logout and password change is a public endpoint:
//! it is sent without a bearer token and never triggers a token refresh.

use harvest_market_core::{CustomerId, Email};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::http::{ApiClient, ApiError, ApiRequest};
use crate::session::{Tokens, User};
use crate::validation::ValidationError;

/// Why a sign-in attempt failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Input rejected before anything was sent.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The backend refused the email/password pair.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The backend could not be reached in time.
    #[error("network error: {0}")]
    Network(#[source] ApiError),

    /// The backend answered with something that is not a login response.
    #[error("unexpected response from server: {0}")]
    MalformedResponse(String),

    /// Any other backend error.
    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for AuthError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Status(ref body) if matches!(body.status, 401 | 403) => {
                Self::InvalidCredentials
            }
            ApiError::Network(_) | ApiError::Timeout(_) => Self::Network(e),
            ApiError::NonJson { .. } | ApiError::MalformedResponse { .. } => {
                Self::MalformedResponse(e.to_string())
            }
            other => Self::Api(other),
        }
    }
}

/// Successful login.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "LoginPayload")]
pub struct LoginResponse {
    pub user: User,
    pub tokens: Tokens,
    /// Access token expiry as reported by the backend.
    pub expires_at: Option<String>,
    pub password_changed_at: Option<String>,
    /// Whether the customer has saved at least one address.
    pub has_addresses: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: User,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    password_changed_at: Option<String>,
    #[serde(default)]
    addresses: bool,
}

impl From<LoginPayload> for LoginResponse {
    fn from(payload: LoginPayload) -> Self {
        Self {
            user: payload.user,
            tokens: Tokens::new(
                payload.access_token,
                payload.refresh_token.filter(|token| !token.is_empty()),
            ),
            expires_at: payload.expires_at,
            password_changed_at: payload.password_changed_at,
            has_addresses: payload.addresses,
        }
    }
}

/// Postal address supplied at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationAddress {
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
}

/// Registration payload.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub password: SecretString,
    pub phone_number: String,
    pub address: RegistrationAddress,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewCustomerBody<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
    password: &'a str,
    phone_number: &'a str,
    address: &'a RegistrationAddress,
}

/// Account created by registration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredCustomer {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// A reset code was sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordResetRequested {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// A reset code was accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenIssued {
    #[serde(default)]
    pub message: String,
    pub reset_token: String,
}

/// Outcome of an email verification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_email_verified: bool,
}

impl ApiClient {
    /// Exchange an email/password pair for a session.
    ///
    /// Does not touch the session store; see `Marketplace::login`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` on 401/403, and the other
    /// `AuthError` variants for transport and decoding failures.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<LoginResponse, AuthError> {
        let request = ApiRequest::post("/auth/login")
            .json(&serde_json::json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            }))?
            .public();
        let response: LoginResponse = self.send(request).await?;
        if response.tokens.access.expose_secret().is_empty() {
            return Err(AuthError::MalformedResponse(
                "login response carries an empty access token".to_string(),
            ));
        }
        info!("Signed in");
        Ok(response)
    }

    /// Tell the backend to revoke the current session.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.send::<serde_json::Value>(ApiRequest::post("/logout"))
            .await
            .map(drop)
    }

    /// Create a customer account.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails, e.g. when the email is taken.
    #[instrument(skip(self, customer), fields(email = %customer.email))]
    pub async fn register(&self, customer: &NewCustomer) -> Result<RegisteredCustomer, ApiError> {
        let body = NewCustomerBody {
            first_name: &customer.first_name,
            last_name: &customer.last_name,
            email: customer.email.as_str(),
            password: customer.password.expose_secret(),
            phone_number: &customer.phone_number,
            address: &customer.address,
        };
        let request = ApiRequest::post("/shop/customers/register")
            .json(&body)?
            .public();
        self.send::<super::MaybeWrapped<RegisteredCustomer>>(request)
            .await
            .map(super::MaybeWrapped::into_inner)
    }

    /// Verify a one-time code sent to `contact` (email or phone).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the code is rejected or the request fails.
    #[instrument(skip(self, otp))]
    pub async fn verify_otp(
        &self,
        contact: &str,
        otp: &str,
        purpose: &str,
    ) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post("/otp/verify")
            .json(&serde_json::json!({ "contact": contact, "otp": otp, "purpose": purpose }))?
            .public();
        self.send_message(request).await
    }

    /// Ask for a password reset code.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn request_password_reset(
        &self,
        email: &Email,
    ) -> Result<PasswordResetRequested, ApiError> {
        let request = ApiRequest::post("/auth/password/reset-request")
            .json(&serde_json::json!({ "email": email.as_str() }))?
            .public();
        self.send(request).await
    }

    /// Trade a reset code for a reset token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the code is rejected or the request fails.
    #[instrument(skip(self, otp), fields(email = %email))]
    pub async fn verify_reset_otp(
        &self,
        email: &Email,
        otp: &str,
    ) -> Result<ResetTokenIssued, ApiError> {
        let request = ApiRequest::post("/auth/password/verify-otp")
            .json(&serde_json::json!({ "email": email.as_str(), "otp": otp }))?
            .public();
        self.send(request).await
    }

    /// Set a new password with a reset token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the token is rejected or the request fails.
    #[instrument(skip_all)]
    pub async fn reset_password(
        &self,
        reset_token: &str,
        new_password: &SecretString,
    ) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post("/auth/password/reset")
            .json(&serde_json::json!({
                "resetToken": reset_token,
                "newPassword": new_password.expose_secret(),
            }))?
            .public();
        self.send_message(request).await
    }

    /// Change the signed-in customer's password.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the current password is wrong, the session
    /// expired, or the request fails.
    #[instrument(skip_all)]
    pub async fn change_password(
        &self,
        current_password: &SecretString,
        new_password: &SecretString,
    ) -> Result<MessageResponse, ApiError> {
        let request = ApiRequest::post("/auth/password/change").json(&serde_json::json!({
            "currentPassword": current_password.expose_secret(),
            "newPassword": new_password.expose_secret(),
        }))?;
        self.send_message(request).await
    }

    /// Confirm an email address with the code sent to it.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the code is rejected or the request fails.
    #[instrument(skip(self, otp), fields(email = %email))]
    pub async fn verify_email(
        &self,
        email: &Email,
        otp: &str,
        reference: &str,
    ) -> Result<VerificationResponse, ApiError> {
        let request = ApiRequest::post("/verify-email")
            .json(&serde_json::json!({
                "email": email.as_str(),
                "otp": otp,
                "reference": reference,
            }))?
            .public();
        self.send(request).await
    }

    /// Send a request whose response may be an acknowledgement or nothing.
    async fn send_message(&self, request: ApiRequest) -> Result<MessageResponse, ApiError> {
        self.send::<Option<MessageResponse>>(request)
            .await
            .map(Option::unwrap_or_default)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use harvest_market_core::UserType;
    use reqwest::StatusCode;

    use super::*;
    use crate::http::ErrorBody;

    #[test]
    fn test_login_response_wire_format() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"passwordChangedAt":"2024-01-01T00:00:00Z","addresses":true,
                "accessToken":"acc","refreshToken":"ref","expiresAt":"2024-06-01T00:00:00Z",
                "user":{"phone":"0241234567","email":"kofi@harvest.market","firstName":"Kofi",
                        "lastName":"Boateng","userType":"ADMIN","status":"ACTIVE",
                        "lastLogin":"2024-03-15T10:00:00Z"}}"#,
        )
        .unwrap();
        assert_eq!(response.tokens.access.expose_secret(), "acc");
        assert_eq!(
            response.tokens.refresh.as_ref().unwrap().expose_secret(),
            "ref"
        );
        assert_eq!(response.user.user_type, UserType::Admin);
        assert!(response.has_addresses);
    }

    #[test]
    fn test_login_response_without_refresh_token() {
        let response: LoginResponse = serde_json::from_str(
            r#"{"accessToken":"acc","refreshToken":"",
                "user":{"email":"kofi@harvest.market","firstName":"Kofi","lastName":"B"}}"#,
        )
        .unwrap();
        assert!(response.tokens.refresh.is_none());
        assert!(!response.has_addresses);
    }

    #[test]
    fn test_auth_error_classification() {
        let unauthorized =
            ApiError::Status(ErrorBody::from_response(StatusCode::UNAUTHORIZED, b""));
        assert!(matches!(
            AuthError::from(unauthorized),
            AuthError::InvalidCredentials
        ));

        assert!(matches!(
            AuthError::from(ApiError::Timeout(Duration::from_secs(10))),
            AuthError::Network(_)
        ));

        let non_json = ApiError::NonJson {
            status: 200,
            snippet: "<html>".to_string(),
        };
        assert!(matches!(
            AuthError::from(non_json),
            AuthError::MalformedResponse(_)
        ));

        let server = ApiError::Status(ErrorBody::from_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            b"",
        ));
        assert!(matches!(AuthError::from(server), AuthError::Api(_)));
    }
}
