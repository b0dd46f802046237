//! Orders held by the backend.

use chrono::{DateTime, Utc};
use harvest_market_core::{CatalogId, RemoteOrderId, RemoteOrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::MaybeWrapped;
use crate::http::{ApiClient, ApiError, ApiRequest};

/// One line of a backend order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrderLine {
    #[serde(default)]
    pub product_id: Option<CatalogId>,
    #[serde(default)]
    pub product_name: String,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub unit_price: Decimal,
}

/// An order as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteOrder {
    pub id: RemoteOrderId,
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub status: RemoteOrderStatus,
    #[serde(default)]
    pub items: Vec<RemoteOrderLine>,
}

impl ApiClient {
    /// List the signed-in customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails.
    #[instrument(skip(self))]
    pub async fn orders(&self) -> Result<Vec<RemoteOrder>, ApiError> {
        self.send::<MaybeWrapped<Vec<RemoteOrder>>>(ApiRequest::get("/orders"))
            .await
            .map(MaybeWrapped::into_inner)
    }

    /// Fetch one order.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the request fails; an unknown order is
    /// `ApiError::Status` with status 404.
    #[instrument(skip(self), fields(order_id = %id))]
    pub async fn order(&self, id: RemoteOrderId) -> Result<RemoteOrder, ApiError> {
        self.send::<MaybeWrapped<RemoteOrder>>(ApiRequest::get(format!("/orders/{id}")))
            .await
            .map(MaybeWrapped::into_inner)
    }
}
