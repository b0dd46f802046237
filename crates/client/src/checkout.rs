//! Checkout flow.
//!
//! [`CheckoutFlow`] tracks the form state (step, shipping address, selected
//! payment method, pending/error flags). [`place_order`] turns the cart into
//! a stored [`Order`] and empties the cart.
//!
//! Payment details are validated and then dropped: only the payment method
//! tag is kept with the order.

use chrono::{DateTime, Utc};
use harvest_market_core::PaymentMethod;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, instrument};

use crate::cart::CartStore;
use crate::orders::{Order, OrderHistory};
use crate::storage::StorageError;

/// Why an order could not be placed.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Please sign in to check out")]
    NotSignedIn,

    #[error("Your cart is empty")]
    EmptyCart,

    #[error("Please fill in all mobile money details")]
    IncompleteMobileMoney,

    #[error("Please fill in all credit card details")]
    IncompleteCard,

    #[error("Failed to record order: {0}")]
    Storage(#[from] StorageError),
}

/// Checkout form step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStep {
    #[default]
    Shipping,
    Payment,
    Confirmation,
}

/// Where the order should be delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub first_name: String,
    pub last_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// Payment details as entered. Never persisted.
#[derive(Debug, Clone)]
pub enum PaymentDetails {
    MobileMoney {
        network: String,
        phone_number: String,
    },
    CreditCard {
        card_number: SecretString,
        card_name: String,
        expiry_date: String,
        cvv: SecretString,
    },
}

impl PaymentDetails {
    /// The method these details belong to.
    #[must_use]
    pub const fn method(&self) -> PaymentMethod {
        match self {
            Self::MobileMoney { .. } => PaymentMethod::MobileMoney,
            Self::CreditCard { .. } => PaymentMethod::CreditCard,
        }
    }

    /// Check that every field of the selected method is filled in.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::IncompleteMobileMoney` or
    /// `CheckoutError::IncompleteCard`.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        match self {
            Self::MobileMoney {
                network,
                phone_number,
            } => {
                if network.trim().is_empty() || phone_number.trim().is_empty() {
                    return Err(CheckoutError::IncompleteMobileMoney);
                }
            }
            Self::CreditCard {
                card_number,
                card_name,
                expiry_date,
                cvv,
            } => {
                if card_number.expose_secret().trim().is_empty()
                    || card_name.trim().is_empty()
                    || expiry_date.trim().is_empty()
                    || cvv.expose_secret().trim().is_empty()
                {
                    return Err(CheckoutError::IncompleteCard);
                }
            }
        }
        Ok(())
    }
}

/// State transitions of the checkout form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutAction {
    SetShippingAddress(ShippingAddress),
    SetPaymentMethod(PaymentMethod),
    SetStep(CheckoutStep),
    SetLoading(bool),
    /// Record a failure; also clears the pending flag.
    SetError(String),
    ClearError,
    Reset,
}

/// Checkout form state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutFlow {
    pub step: CheckoutStep,
    pub shipping_address: Option<ShippingAddress>,
    pub payment_method: Option<PaymentMethod>,
    pub loading: bool,
    pub error: Option<String>,
}

impl CheckoutFlow {
    #[must_use]
    pub fn apply(self, action: CheckoutAction) -> Self {
        match action {
            CheckoutAction::SetShippingAddress(address) => Self {
                shipping_address: Some(address),
                ..self
            },
            CheckoutAction::SetPaymentMethod(method) => Self {
                payment_method: Some(method),
                ..self
            },
            CheckoutAction::SetStep(step) => Self { step, ..self },
            CheckoutAction::SetLoading(loading) => Self { loading, ..self },
            CheckoutAction::SetError(error) => Self {
                error: Some(error),
                loading: false,
                ..self
            },
            CheckoutAction::ClearError => Self {
                error: None,
                ..self
            },
            CheckoutAction::Reset => Self::default(),
        }
    }
}

/// Place an order for the current cart.
///
/// The cart must not be empty and `payment` must be complete. On success the
/// order is appended to `history` and the cart is reset; on failure nothing
/// changes.
///
/// # Errors
///
/// Returns `CheckoutError` for an empty cart, incomplete payment details, or
/// when the order cannot be stored.
#[instrument(skip_all, fields(method = %payment.method()))]
pub fn place_order(
    cart: &CartStore,
    history: &OrderHistory,
    payment: &PaymentDetails,
    now: DateTime<Utc>,
) -> Result<Order, CheckoutError> {
    let snapshot = cart.current();
    if snapshot.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }
    payment.validate()?;

    let order = Order::from_cart(&snapshot, payment.method(), now);
    history.append(&order)?;
    cart.reset();

    info!(
        order_number = %order.order_number,
        total = %order.total,
        "Order placed"
    );
    Ok(order)
}
