//! Harvest Market client library.
//!
//! The client side of the marketplace without a UI: durable storage, the
//! cart / session / wishlist / checkout state machines, the backend API client
//! with token refresh, and the routing table.
//!
//! # Architecture
//!
//! State lives in stores ([`CartStore`], [`SessionStore`], [`WishlistStore`]).
//! Each store applies actions through a pure transition function, publishes
//! the result over a `tokio::sync::watch` channel and mirrors it into
//! [`Storage`]. Storage is a sink: stores never read it back except when
//! hydrating at startup or when another context changed it.
//!
//! [`ApiClient`] reads credentials from the session store and writes renewed
//! tokens back through it. [`Marketplace`] bundles everything for one
//! browsing context.
//!
//! # Modules
//!
//! - [`storage`] - Key-value persistence with cross-context change signals
//! - [`cart`] - Cart state machine
//! - [`session`] - Session state machine
//! - [`http`] - HTTP client with single-flight token refresh
//! - [`api`] - Typed backend endpoints
//! - [`checkout`] / [`orders`] - Checkout flow and local order history
//! - [`wishlist`] - Saved products
//! - [`routes`] - Path table with protected pages
//! - [`validation`] - Local form checks

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod http;
pub mod marketplace;
pub mod orders;
pub mod routes;
pub mod session;
pub mod storage;
pub mod validation;
pub mod wishlist;

pub use cart::{Cart, CartAction, CartItem, CartStore, NewCartItem};
pub use config::{ClientConfig, ConfigError};
pub use error::ClientError;
pub use http::{ApiClient, ApiError, ApiRequest};
pub use marketplace::Marketplace;
pub use session::{Session, SessionAction, SessionStore, Tokens, User};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
