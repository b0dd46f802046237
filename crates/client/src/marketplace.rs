//! The marketplace client as one object.
//!
//! [`Marketplace`] owns the stores of one browsing context (session, cart,
//! wishlist, checkout form), the local order history and the API client, and
//! implements the operations that span several of them: sign-in and
//! sign-out, checkout, tracking and routing.

use chrono::Utc;
use secrecy::SecretString;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::api::{AuthError, ProductDetails, RegisteredCustomer, UserProfile};
use crate::cart::{Cart, CartStore};
use crate::checkout::{
    CheckoutAction, CheckoutError, CheckoutFlow, CheckoutStep, PaymentDetails, ShippingAddress,
    place_order,
};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::{ApiClient, ApiError};
use crate::orders::{Order, OrderHistory, TrackError, TrackQuery};
use crate::routes::{self, RouteDecision};
use crate::session::{SessionAction, SessionStore, User};
use crate::storage::{FileStorage, Storage, keys};
use crate::validation::{SignUpForm, validate_login};
use crate::wishlist::{Wishlist, WishlistItem, WishlistStore};

/// Client state and operations for one browsing context.
///
/// Cheap to clone; clones share every store.
#[derive(Clone)]
pub struct Marketplace {
    storage: Storage,
    session: SessionStore,
    cart: CartStore,
    wishlist: WishlistStore,
    orders: OrderHistory,
    checkout: watch::Sender<CheckoutFlow>,
    api: ApiClient,
}

impl Marketplace {
    /// Hydrate every store from `storage` and bind an API client to the
    /// session.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` if the HTTP client cannot be built.
    pub fn new(config: ClientConfig, storage: Storage) -> Result<Self, ClientError> {
        let session = SessionStore::hydrate(storage.clone());
        let cart = CartStore::hydrate(storage.clone());
        let wishlist = WishlistStore::hydrate(storage.clone());
        let orders = OrderHistory::new(storage.clone());
        let api = ApiClient::new(config, session.clone())?;
        let (checkout, _) = watch::channel(CheckoutFlow::default());

        debug!(
            authenticated = session.is_authenticated(),
            cart_items = cart.current().total_items(),
            "Marketplace hydrated"
        );

        Ok(Self {
            storage,
            session,
            cart,
            wishlist,
            orders,
            checkout,
            api,
        })
    }

    /// Open the marketplace over the file storage named by
    /// `config.storage_dir`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` if the HTTP client cannot be built.
    pub fn open(config: ClientConfig) -> Result<Self, ClientError> {
        let storage = Storage::new(FileStorage::new(&config.storage_dir));
        Self::new(config, storage)
    }

    /// Another browsing context over the same storage backend.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` if the HTTP client cannot be built.
    pub fn open_context(&self) -> Result<Self, ClientError> {
        Self::new(self.api.config().clone(), self.storage.open_context())
    }

    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub const fn cart(&self) -> &CartStore {
        &self.cart
    }

    #[must_use]
    pub const fn wishlist(&self) -> &WishlistStore {
        &self.wishlist
    }

    #[must_use]
    pub const fn orders(&self) -> &OrderHistory {
        &self.orders
    }

    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The signed-in user, if any.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.session.current().user().cloned()
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Sign in with an email and password.
    ///
    /// On success the credentials and user are stored and the session becomes
    /// authenticated. On failure nothing changes.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Invalid` for bad input, `InvalidCredentials` when the
    /// backend refuses the pair, `Network` or `MalformedResponse` for
    /// transport and decoding failures.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User, AuthError> {
        let email = validate_login(email, password)?;
        let response = self.api.login(&email, password).await?;
        let user = response.user.clone();
        self.session.dispatch(SessionAction::Login {
            user: response.user,
            tokens: response.tokens,
        });
        Ok(user)
    }

    /// Create an account. The new customer still has to sign in.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an invalid form and
    /// `ClientError::Api` if the backend rejects it.
    #[instrument(skip_all)]
    pub async fn register(&self, form: SignUpForm) -> Result<RegisteredCustomer, ClientError> {
        let customer = form.validate()?;
        Ok(self.api.register(&customer).await?)
    }

    /// Sign out locally.
    ///
    /// Afterwards the session is anonymous, the cart and wishlist are empty,
    /// and storage holds no credentials, user, cart or wishlist.
    pub fn logout(&self) {
        self.session.dispatch(SessionAction::Logout);
        self.cart.reset();
        self.wishlist.clear();
        self.checkout.send_replace(CheckoutFlow::default());

        for key in [keys::CART, keys::WISHLIST] {
            if let Err(e) = self.storage.remove(key) {
                error!(key, error = %e, "Failed to clear stored state");
            }
        }
        info!("Signed out");
    }

    /// Tell the backend to end the session, then sign out locally.
    ///
    /// The local sign-out happens even if the backend call fails.
    #[instrument(skip(self))]
    pub async fn revoke_and_logout(&self) {
        if self.session.is_authenticated()
            && let Err(e) = self.api.logout().await
        {
            warn!(error = %e, "Backend logout failed, signing out locally");
        }
        self.logout();
    }

    /// Confirm the stored session with the backend.
    ///
    /// Returns the profile when the session is valid and `None` when there is
    /// no session. A session the backend no longer accepts is signed out.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Api` for failures other than an expired session.
    #[instrument(skip(self))]
    pub async fn verify_session(&self) -> Result<Option<UserProfile>, ClientError> {
        if !self.session.is_authenticated() {
            return Ok(None);
        }
        match self.api.profile().await {
            Ok(profile) => Ok(Some(profile)),
            Err(ApiError::SessionExpired) => {
                warn!("Stored session is no longer valid");
                self.logout();
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Cart & wishlist
    // =========================================================================

    /// Add one unit of a catalog product to the cart.
    pub fn add_to_cart(&self, product: &ProductDetails) -> Cart {
        self.cart.add_item(product.to_cart_item())
    }

    /// Save a catalog product to the wishlist.
    pub fn save_for_later(&self, product: &ProductDetails) -> Wishlist {
        self.wishlist
            .add(WishlistItem::from(product.to_cart_item()))
    }

    /// Move a saved product into the cart. Returns `None` if it was not saved.
    pub fn move_to_cart(&self, item: &WishlistItem) -> Option<Cart> {
        if !self.wishlist.current().contains(&item.id) {
            return None;
        }
        self.wishlist.remove(item.id.clone());
        Some(self.cart.add_item(item.clone().into()))
    }

    // =========================================================================
    // Checkout & orders
    // =========================================================================

    /// Current checkout form state.
    #[must_use]
    pub fn checkout_flow(&self) -> CheckoutFlow {
        self.checkout.borrow().clone()
    }

    /// Observe the checkout form.
    #[must_use]
    pub fn subscribe_checkout(&self) -> watch::Receiver<CheckoutFlow> {
        self.checkout.subscribe()
    }

    /// Apply a checkout form action.
    pub fn update_checkout(&self, action: CheckoutAction) -> CheckoutFlow {
        let mut next = CheckoutFlow::default();
        self.checkout.send_modify(|flow| {
            *flow = std::mem::take(flow).apply(action);
            next = flow.clone();
        });
        next
    }

    /// Place an order for the cart.
    ///
    /// Requires a signed-in session. On success the order is stored, the cart
    /// is emptied and the checkout form moves to confirmation; on failure the
    /// form records the error.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError` when not signed in, the cart is empty, payment
    /// details are incomplete, or the order cannot be stored.
    #[instrument(skip_all)]
    pub fn checkout(
        &self,
        shipping: Option<ShippingAddress>,
        payment: &PaymentDetails,
    ) -> Result<Order, CheckoutError> {
        if !self.session.is_authenticated() {
            return Err(CheckoutError::NotSignedIn);
        }

        if let Some(address) = shipping {
            self.update_checkout(CheckoutAction::SetShippingAddress(address));
        }
        self.update_checkout(CheckoutAction::ClearError);
        self.update_checkout(CheckoutAction::SetPaymentMethod(payment.method()));
        self.update_checkout(CheckoutAction::SetLoading(true));

        match place_order(&self.cart, &self.orders, payment, Utc::now()) {
            Ok(order) => {
                self.update_checkout(CheckoutAction::SetLoading(false));
                self.update_checkout(CheckoutAction::SetStep(CheckoutStep::Confirmation));
                Ok(order)
            }
            Err(e) => {
                self.update_checkout(CheckoutAction::SetError(e.to_string()));
                Err(e)
            }
        }
    }

    /// Find a locally placed order by order or tracking number.
    ///
    /// # Errors
    ///
    /// Returns `TrackError` if no reference is given or nothing matches.
    pub fn track(&self, query: &TrackQuery) -> Result<Order, TrackError> {
        self.orders.track(query)
    }

    // =========================================================================
    // Routing & synchronization
    // =========================================================================

    /// Decide what to show for `path` given the current session.
    #[must_use]
    pub fn resolve_route(&self, path: &str) -> RouteDecision {
        routes::resolve(path, self.session.is_authenticated())
    }

    /// Keep this context in step with writes made by other contexts.
    ///
    /// The spawned task re-reads the session, cart and wishlist from storage
    /// whenever another context changes them, without writing anything back.
    /// It runs until the returned handle is aborted.
    #[must_use]
    pub fn spawn_storage_sync(&self) -> JoinHandle<()> {
        let mut changes = self.storage.changes();
        let session = self.session.clone();
        let cart = self.cart.clone();
        let wishlist = self.wishlist.clone();

        tokio::spawn(async move {
            while let Some(event) = changes.next().await {
                debug!(key = ?event.key, "Storage changed in another context");
                if keys::AUTH.iter().any(|key| event.affects(key)) {
                    session.resync();
                }
                if event.affects(keys::CART) {
                    cart.resync();
                }
                if event.affects(keys::WISHLIST) {
                    wishlist.resync();
                }
            }
        })
    }
}

impl std::fmt::Debug for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marketplace")
            .field("storage", &self.storage)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}
