//! Unified error type for the [`Marketplace`](crate::Marketplace) facade.

use thiserror::Error;

use crate::api::AuthError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::http::ApiError;
use crate::orders::TrackError;
use crate::storage::StorageError;
use crate::validation::ValidationError;

/// Facade-level error.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Track(#[from] TrackError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl ClientError {
    /// Whether the caller should send the user back to sign-in.
    #[must_use]
    pub const fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::SessionExpired)
                | Self::Auth(AuthError::Api(ApiError::SessionExpired))
                | Self::Checkout(CheckoutError::NotSignedIn)
        )
    }
}
