//! Shopping cart state machine.
//!
//! [`Cart::apply`] is the pure transition function; [`CartStore`] owns the
//! current cart for one context, applies dispatched [`CartAction`]s one at a
//! time, writes every new state to durable storage and publishes it to
//! observers.

use harvest_market_core::{Price, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::storage::{Storage, keys};

/// A product being added to the cart. Quantity is managed by the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCartItem {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub image: String,
}

/// One line of the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub image: String,
    pub quantity: u32,
}

impl CartItem {
    /// Price of this line (unit price × quantity).
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// State transitions accepted by the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add one unit, appending a new line if the product is not in the cart.
    AddItem(NewCartItem),
    /// Drop the line for a product; no-op when absent.
    RemoveItem(ProductId),
    /// Set a line's quantity exactly; zero removes the line.
    UpdateQuantity { id: ProductId, quantity: u32 },
    /// Empty the cart.
    Reset,
    /// Replace every line, e.g. with the contents of durable storage.
    Replace(Vec<CartItem>),
}

/// Ordered collection of cart lines with unique product ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from stored lines, restoring the cart invariants.
    ///
    /// Lines with quantity zero are dropped and repeated ids are merged into
    /// the first occurrence.
    #[must_use]
    pub fn from_items(items: Vec<CartItem>) -> Self {
        let mut cart = Self::new();
        for item in items.into_iter().filter(|item| item.quantity > 0) {
            if let Some(existing) = cart.items.iter_mut().find(|line| line.id == item.id) {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
            } else {
                cart.items.push(item);
            }
        }
        cart
    }

    /// Apply one action, returning the next state.
    #[must_use]
    pub fn apply(mut self, action: CartAction) -> Self {
        match action {
            CartAction::AddItem(new_item) => {
                if let Some(line) = self.items.iter_mut().find(|line| line.id == new_item.id) {
                    line.quantity = line.quantity.saturating_add(1);
                } else {
                    self.items.push(CartItem {
                        id: new_item.id,
                        title: new_item.title,
                        price: new_item.price,
                        image: new_item.image,
                        quantity: 1,
                    });
                }
            }
            CartAction::RemoveItem(id) => self.items.retain(|line| line.id != id),
            CartAction::UpdateQuantity { id, quantity } => {
                if quantity < 1 {
                    self.items.retain(|line| line.id != id);
                } else if let Some(line) = self.items.iter_mut().find(|line| line.id == id) {
                    line.quantity = quantity;
                }
            }
            CartAction::Reset => self.items.clear(),
            CartAction::Replace(items) => return Self::from_items(items),
        }
        self
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Line for `id`, if present.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|line| &line.id == id)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|line| u64::from(line.quantity)).sum()
    }

    /// Sum of price × quantity over all lines.
    #[must_use]
    pub fn total_price(&self) -> Price {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

/// The cart of one browsing context, mirrored to durable storage.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct CartStore {
    state: watch::Sender<Cart>,
    storage: Storage,
}

impl CartStore {
    /// Create a store hydrated from durable storage.
    ///
    /// A missing or malformed stored cart yields an empty cart.
    #[must_use]
    pub fn hydrate(storage: Storage) -> Self {
        let cart = load_stored_cart(&storage);
        let (state, _) = watch::channel(cart);
        Self { state, storage }
    }

    /// Apply an action, persist the result and notify observers.
    ///
    /// Returns the new cart.
    pub fn dispatch(&self, action: CartAction) -> Cart {
        debug!(?action, "Cart action");
        let mut next = Cart::new();
        self.state.send_modify(|cart| {
            *cart = std::mem::take(cart).apply(action);
            if let Err(e) = self.storage.save(keys::CART, cart.items()) {
                error!(error = %e, "Failed to persist cart");
            }
            next = cart.clone();
        });
        next
    }

    /// Add one unit of a product.
    pub fn add_item(&self, item: NewCartItem) -> Cart {
        self.dispatch(CartAction::AddItem(item))
    }

    /// Remove a product's line.
    pub fn remove_item(&self, id: ProductId) -> Cart {
        self.dispatch(CartAction::RemoveItem(id))
    }

    /// Set a line's quantity; zero removes it.
    pub fn update_quantity(&self, id: ProductId, quantity: u32) -> Cart {
        self.dispatch(CartAction::UpdateQuantity { id, quantity })
    }

    /// Empty the cart.
    pub fn reset(&self) -> Cart {
        self.dispatch(CartAction::Reset)
    }

    /// Replace every line.
    pub fn replace(&self, items: Vec<CartItem>) -> Cart {
        self.dispatch(CartAction::Replace(items))
    }

    /// Re-read the cart another context wrote, without writing it back.
    pub fn resync(&self) -> Cart {
        let cart = load_stored_cart(&self.storage);
        self.state.send_replace(cart.clone());
        cart
    }

    /// Snapshot of the current cart.
    #[must_use]
    pub fn current(&self) -> Cart {
        self.state.borrow().clone()
    }

    /// Observe cart changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.state.subscribe()
    }
}

fn load_stored_cart(storage: &Storage) -> Cart {
    storage
        .load::<Vec<CartItem>>(keys::CART)
        .map(Cart::from_items)
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn produce(id: &str, price: i64) -> NewCartItem {
        NewCartItem {
            id: ProductId::new(id),
            title: format!("Produce {id}"),
            price: Price::from_units(price),
            image: format!("/images/{id}.jpg"),
        }
    }

    #[test]
    fn test_add_same_item_twice() {
        let cart = Cart::new()
            .apply(CartAction::AddItem(produce("a1", 90)))
            .apply(CartAction::AddItem(produce("a1", 90)));

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
        assert_eq!(cart.total_price(), Price::from_units(180));
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn test_repeated_adds_count_calls() {
        for calls in 1..=7_u32 {
            let cart = (0..calls).fold(Cart::new(), |cart, _| {
                cart.apply(CartAction::AddItem(produce("yam", 12)))
            });
            assert_eq!(cart.items().len(), 1);
            assert_eq!(cart.items()[0].quantity, calls);
        }
    }

    #[test]
    fn test_add_keeps_insertion_order() {
        let cart = Cart::new()
            .apply(CartAction::AddItem(produce("rice", 950)))
            .apply(CartAction::AddItem(produce("corn", 245)))
            .apply(CartAction::AddItem(produce("rice", 950)));
        let ids: Vec<&str> = cart.items().iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["rice", "corn"]);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let cart = Cart::new().apply(CartAction::AddItem(produce("a1", 90)));
        let after = cart.clone().apply(CartAction::RemoveItem(ProductId::new("zz")));
        assert_eq!(after, cart);
    }

    #[test]
    fn test_update_quantity_zero_equals_remove() {
        let cart = Cart::new()
            .apply(CartAction::AddItem(produce("x", 50)))
            .apply(CartAction::UpdateQuantity {
                id: ProductId::new("x"),
                quantity: 2,
            });
        assert_eq!(cart.total_price(), Price::from_units(100));

        let updated = cart.clone().apply(CartAction::UpdateQuantity {
            id: ProductId::new("x"),
            quantity: 0,
        });
        let removed = cart.apply(CartAction::RemoveItem(ProductId::new("x")));
        assert_eq!(updated, removed);
        assert!(updated.is_empty());
        assert_eq!(updated.total_price(), Price::ZERO);
    }

    #[test]
    fn test_update_quantity_sets_exactly() {
        let cart = Cart::new()
            .apply(CartAction::AddItem(produce("x", 50)))
            .apply(CartAction::UpdateQuantity {
                id: ProductId::new("x"),
                quantity: 9,
            });
        assert_eq!(cart.get(&ProductId::new("x")).unwrap().quantity, 9);

        // Unknown ids are left alone.
        let same = cart.clone().apply(CartAction::UpdateQuantity {
            id: ProductId::new("nope"),
            quantity: 4,
        });
        assert_eq!(same, cart);
    }

    #[test]
    fn test_totals_match_lines() {
        let cart = Cart::new()
            .apply(CartAction::AddItem(produce("a", 10)))
            .apply(CartAction::AddItem(produce("b", 25)))
            .apply(CartAction::UpdateQuantity {
                id: ProductId::new("b"),
                quantity: 3,
            })
            .apply(CartAction::AddItem(produce("a", 10)));

        let expected_price: Price = cart.items().iter().map(|i| i.price * i.quantity).sum();
        let expected_items: u64 = cart.items().iter().map(|i| u64::from(i.quantity)).sum();
        assert_eq!(cart.total_price(), expected_price);
        assert_eq!(cart.total_price(), Price::from_units(95));
        assert_eq!(cart.total_items(), expected_items);
        assert_eq!(cart.total_items(), 5);
    }

    #[test]
    fn test_reset_and_replace() {
        let cart = Cart::new().apply(CartAction::AddItem(produce("a", 10)));
        assert!(cart.clone().apply(CartAction::Reset).is_empty());

        let replaced = cart.apply(CartAction::Replace(vec![CartItem {
            id: ProductId::new("b"),
            title: "Beans".to_string(),
            price: Price::from_units(4),
            image: String::new(),
            quantity: 6,
        }]));
        assert_eq!(replaced.items().len(), 1);
        assert_eq!(replaced.total_items(), 6);
    }

    #[test]
    fn test_from_items_restores_invariants() {
        let line = |id: &str, quantity| CartItem {
            id: ProductId::new(id),
            title: id.to_string(),
            price: Price::from_units(1),
            image: String::new(),
            quantity,
        };
        let cart = Cart::from_items(vec![line("a", 2), line("b", 0), line("a", 3)]);
        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn test_store_persists_every_mutation() {
        let storage = Storage::in_memory();
        let store = CartStore::hydrate(storage.clone());

        store.add_item(produce("a1", 90));
        let stored: Vec<CartItem> = storage.load(keys::CART).unwrap();
        assert_eq!(stored.len(), 1);

        store.update_quantity(ProductId::new("a1"), 4);
        let stored: Vec<CartItem> = storage.load(keys::CART).unwrap();
        assert_eq!(stored[0].quantity, 4);

        store.reset();
        let stored: Vec<CartItem> = storage.load(keys::CART).unwrap();
        assert!(stored.is_empty());
    }

    #[test]
    fn test_store_hydrates_from_storage() {
        let storage = Storage::in_memory();
        CartStore::hydrate(storage.clone()).add_item(produce("a1", 90));

        let reopened = CartStore::hydrate(storage);
        assert_eq!(reopened.current().total_price(), Price::from_units(90));
    }

    #[test]
    fn test_store_ignores_malformed_storage() {
        let storage = Storage::in_memory();
        storage.save(keys::CART, "definitely not a cart").unwrap();
        let store = CartStore::hydrate(storage);
        assert!(store.current().is_empty());
    }

    #[test]
    fn test_store_reads_stored_numbers() {
        let storage = Storage::in_memory();
        let raw: serde_json::Value = serde_json::from_str(
            r#"[{"id":"x","title":"Sorghum","price":50,"image":"s.jpg","quantity":2}]"#,
        )
        .unwrap();
        storage.save(keys::CART, &raw).unwrap();

        let store = CartStore::hydrate(storage);
        assert_eq!(store.current().total_price(), Price::from_units(100));
    }

    #[tokio::test]
    async fn test_store_notifies_observers() {
        let store = CartStore::hydrate(Storage::in_memory());
        let mut rx = store.subscribe();
        store.add_item(produce("a1", 90));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().total_items(), 1);
    }
}
