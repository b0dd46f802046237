//! CLI command implementations.

pub mod auth;
pub mod catalog;
pub mod orders;

use harvest_market_client::api::AuthError;
use harvest_market_client::checkout::CheckoutError;
use harvest_market_client::orders::TrackError;
use harvest_market_client::validation::ValidationError;
use harvest_market_client::{ApiError, ClientError};
use thiserror::Error;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

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

    #[error("Not signed in. Run `hm-cli auth login` first")]
    NotSignedIn,

    #[error("{0} is not in the {1}")]
    NotSaved(String, &'static str),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
