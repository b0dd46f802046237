//! Customer profile and address endpoints.

use chrono::{DateTime, Utc};
use harvest_market_core::{AddressId, CustomerId, RemoteOrderId, RemoteOrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::MaybeWrapped;
use crate::http::{ApiClient, ApiError, ApiRequest};

/// Saved delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: AddressId,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub is_default: bool,
}

impl Address {
    /// Single-line rendering for lists.
    #[must_use]
    pub fn one_line(&self) -> String {
        [
            self.street.as_str(),
            self.city.as_str(),
            self.region.as_str(),
            self.postal_code.as_str(),
            self.country.as_str(),
        ]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// Address to add to the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    pub street: String,
    pub city: String,
    pub region: String,
    pub postal_code: String,
    pub country: String,
    pub is_default: bool,
}

/// Order summary embedded in the profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentOrder {
    pub id: RemoteOrderId,
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: RemoteOrderStatus,
    #[serde(default)]
    pub item_count: u32,
}

/// The signed-in customer as held by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_email_verified: bool,
    #[serde(default)]
    pub is_phone_verified: bool,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub recent_orders: Vec<RecentOrder>,
}

impl UserProfile {
    /// The address marked default, or the first one.
    #[must_use]
    pub fn default_address(&self) -> Option<&Address> {
        self.addresses
            .iter()
            .find(|address| address.is_default)
            .or_else(|| self.addresses.first())
    }
}

/// Editable profile fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ApiClient {
    /// Fetch the signed-in customer's profile.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::SessionExpired` if the session cannot be renewed, or
    /// another `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        self.send::<MaybeWrapped<UserProfile>>(ApiRequest::get("/shop/customers/me"))
            .await
            .map(MaybeWrapped::into_inner)
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), ApiError> {
        let request = ApiRequest::put("/shop/customers/me").json(update)?;
        self.send::<serde_json::Value>(request).await.map(drop)
    }

    /// List saved addresses.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn addresses(&self) -> Result<Vec<Address>, ApiError> {
        self.send::<MaybeWrapped<Vec<Address>>>(ApiRequest::get("/shop/customers/me/addresses"))
            .await
            .map(MaybeWrapped::into_inner)
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self, address))]
    pub async fn add_address(&self, address: &NewAddress) -> Result<Address, ApiError> {
        let request = ApiRequest::post("/shop/customers/me/addresses").json(address)?;
        self.send::<MaybeWrapped<Address>>(request)
            .await
            .map(MaybeWrapped::into_inner)
    }
}
