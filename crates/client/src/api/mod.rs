//! Typed wrappers over the marketplace backend REST API.
//!
//! Each submodule extends [`ApiClient`](crate::http::ApiClient) with the
//! endpoints of one area:
//!
//! - [`auth`] - login, registration, token refresh, OTP and password flows
//! - [`account`] - customer profile and addresses
//! - [`products`] - catalog listing and detail (detail responses cached)
//! - [`orders`] - order history held by the backend

pub mod account;
pub mod auth;
pub(crate) mod cache;
pub mod orders;
pub mod products;

pub use account::{Address, NewAddress, ProfileUpdate, RecentOrder, UserProfile};
pub use auth::{
    AuthError, LoginResponse, MessageResponse, NewCustomer, PasswordResetRequested,
    RegisteredCustomer, RegistrationAddress, ResetTokenIssued, VerificationResponse,
};
pub use orders::{RemoteOrder, RemoteOrderLine};
pub use products::{
    Pagination, ProductDetails, ProductListResponse, ProductQuery, SortDirection, SortKey,
};

use serde::Deserialize;

/// Some endpoints wrap their payload in `{ "data": ... }`, others do not.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MaybeWrapped<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> MaybeWrapped<T> {
    pub(crate) fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } | Self::Bare(data) => data,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: i64,
    }

    #[test]
    fn test_maybe_wrapped() {
        let wrapped: MaybeWrapped<Item> = serde_json::from_str(r#"{"data":{"id":1}}"#).unwrap();
        assert_eq!(wrapped.into_inner(), Item { id: 1 });

        let bare: MaybeWrapped<Item> = serde_json::from_str(r#"{"id":2}"#).unwrap();
        assert_eq!(bare.into_inner(), Item { id: 2 });

        let list: MaybeWrapped<Vec<Item>> = serde_json::from_str(r#"[{"id":3}]"#).unwrap();
        assert_eq!(list.into_inner().len(), 1);
    }
}
