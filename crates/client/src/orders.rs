//! Local order history.
//!
//! Orders placed from this client are kept under the `orders` storage key as
//! an append-only list. A stored order never changes after it is written.

use chrono::{DateTime, Duration, Utc};
use harvest_market_core::{OrderId, OrderStatus, PaymentMethod, Price, ProductId};
use rand::Rng;
use rand::distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::cart::Cart;
use crate::storage::{Storage, StorageError, keys};

/// Days between placing an order and its estimated delivery.
pub const DELIVERY_ESTIMATE_DAYS: i64 = 7;

const TRACKING_SUFFIX_LEN: usize = 8;

/// Snapshot of one cart line at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    #[serde(default)]
    pub id: Option<ProductId>,
    pub name: String,
    pub quantity: u32,
    pub price: Price,
}

/// An order placed from this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    #[serde(rename = "date")]
    pub placed_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub total: Price,
    pub tracking_number: String,
    pub estimated_delivery: DateTime<Utc>,
    pub payment_method: PaymentMethod,
}

impl Order {
    /// Snapshot `cart` into a new order in the `processing` state.
    #[must_use]
    pub fn from_cart(cart: &Cart, payment_method: PaymentMethod, placed_at: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::generate(),
            order_number: order_number(placed_at),
            placed_at,
            status: OrderStatus::Processing,
            items: cart
                .items()
                .iter()
                .map(|item| OrderLine {
                    id: Some(item.id.clone()),
                    name: item.title.clone(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            total: cart.total_price(),
            tracking_number: tracking_number(),
            estimated_delivery: placed_at + Duration::days(DELIVERY_ESTIMATE_DAYS),
            payment_method,
        }
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// `ORD-` followed by the last six digits of the millisecond timestamp.
fn order_number(placed_at: DateTime<Utc>) -> String {
    format!("ORD-{:06}", placed_at.timestamp_millis().rem_euclid(1_000_000))
}

/// `TRK-` followed by eight random uppercase letters and digits.
fn tracking_number() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TRACKING_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect();
    format!("TRK-{suffix}")
}

/// What a customer typed into the tracking form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackQuery {
    pub order_number: Option<String>,
    pub tracking_number: Option<String>,
}

impl TrackQuery {
    fn normalized(value: Option<&String>) -> Option<String> {
        value
            .map(|v| v.trim().to_ascii_uppercase())
            .filter(|v| !v.is_empty())
    }
}

/// Why an order lookup failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    #[error("Please enter either an order number or tracking number")]
    MissingReference,

    #[error("No order found with the provided details")]
    NotFound,
}

/// Handle on the stored order list.
#[derive(Debug, Clone)]
pub struct OrderHistory {
    storage: Storage,
}

impl OrderHistory {
    #[must_use]
    pub const fn new(storage: Storage) -> Self {
        Self { storage }
    }

    /// Every stored order, oldest first. Unreadable history is empty.
    #[must_use]
    pub fn all(&self) -> Vec<Order> {
        self.storage
            .load::<Vec<Order>>(keys::ORDERS)
            .unwrap_or_default()
    }

    /// Append `order` to the stored list.
    ///
    /// A stored list that cannot be decoded is left in place and the append
    /// is refused.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Malformed` if the stored list is unreadable, or
    /// another `StorageError` if the list cannot be read or written.
    #[instrument(skip_all, fields(order_number = %order.order_number))]
    pub fn append(&self, order: &Order) -> Result<(), StorageError> {
        let mut orders = self
            .storage
            .try_load::<Vec<Order>>(keys::ORDERS)
            .inspect_err(|e| warn!(error = %e, "Refusing to overwrite order history"))?
            .unwrap_or_default();
        orders.push(order.clone());
        self.storage.save(keys::ORDERS, &orders)?;
        debug!(count = orders.len(), "Order recorded");
        Ok(())
    }

    /// Find an order by order number or tracking number, ignoring case and
    /// surrounding whitespace. When both are given, either may match.
    ///
    /// # Errors
    ///
    /// Returns `TrackError::MissingReference` if neither is given and
    /// `TrackError::NotFound` if nothing matches.
    pub fn track(&self, query: &TrackQuery) -> Result<Order, TrackError> {
        let order_number = TrackQuery::normalized(query.order_number.as_ref());
        let tracking_number = TrackQuery::normalized(query.tracking_number.as_ref());
        if order_number.is_none() && tracking_number.is_none() {
            return Err(TrackError::MissingReference);
        }

        self.all()
            .into_iter()
            .find(|order| {
                order_number.as_deref() == Some(order.order_number.to_ascii_uppercase().as_str())
                    || tracking_number.as_deref()
                        == Some(order.tracking_number.to_ascii_uppercase().as_str())
            })
            .ok_or(TrackError::NotFound)
    }
}
