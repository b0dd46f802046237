//! Saved products.

use harvest_market_core::{Price, ProductId};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error};

use crate::cart::NewCartItem;
use crate::storage::{Storage, keys};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: ProductId,
    pub title: String,
    pub price: Price,
    pub image: String,
}

impl From<NewCartItem> for WishlistItem {
    fn from(item: NewCartItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            price: item.price,
            image: item.image,
        }
    }
}

impl From<WishlistItem> for NewCartItem {
    fn from(item: WishlistItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            price: item.price,
            image: item.image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WishlistAction {
    /// Ignored when the product is already saved.
    Add(WishlistItem),
    Remove(ProductId),
    Clear,
}

/// Ordered list of saved products without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist {
    items: Vec<WishlistItem>,
}

impl Wishlist {
    #[must_use]
    pub fn apply(mut self, action: WishlistAction) -> Self {
        match action {
            WishlistAction::Add(item) => {
                if !self.contains(&item.id) {
                    self.items.push(item);
                }
            }
            WishlistAction::Remove(id) => self.items.retain(|item| item.id != id),
            WishlistAction::Clear => self.items.clear(),
        }
        self
    }

    #[must_use]
    pub fn items(&self) -> &[WishlistItem] {
        &self.items
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.items.iter().any(|item| &item.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn dedup(items: Vec<WishlistItem>) -> Self {
        items
            .into_iter()
            .fold(Self::default(), |list, item| list.apply(WishlistAction::Add(item)))
    }
}

/// Wishlist of one browsing context, mirrored to durable storage.
#[derive(Clone)]
pub struct WishlistStore {
    state: watch::Sender<Wishlist>,
    storage: Storage,
}

impl WishlistStore {
    #[must_use]
    pub fn hydrate(storage: Storage) -> Self {
        let (state, _) = watch::channel(load_stored_wishlist(&storage));
        Self { state, storage }
    }

    pub fn dispatch(&self, action: WishlistAction) -> Wishlist {
        debug!(?action, "Wishlist action");
        let mut next = Wishlist::default();
        self.state.send_modify(|list| {
            *list = std::mem::take(list).apply(action);
            if let Err(e) = self.storage.save(keys::WISHLIST, list.items()) {
                error!(error = %e, "Failed to persist wishlist");
            }
            next = list.clone();
        });
        next
    }

    pub fn add(&self, item: WishlistItem) -> Wishlist {
        self.dispatch(WishlistAction::Add(item))
    }

    pub fn remove(&self, id: ProductId) -> Wishlist {
        self.dispatch(WishlistAction::Remove(id))
    }

    pub fn clear(&self) -> Wishlist {
        self.dispatch(WishlistAction::Clear)
    }

    pub fn resync(&self) -> Wishlist {
        let list = load_stored_wishlist(&self.storage);
        self.state.send_replace(list.clone());
        list
    }

    #[must_use]
    pub fn current(&self) -> Wishlist {
        self.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Wishlist> {
        self.state.subscribe()
    }
}

fn load_stored_wishlist(storage: &Storage) -> Wishlist {
    storage
        .load::<Vec<WishlistItem>>(keys::WISHLIST)
        .map(Wishlist::dedup)
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cassava() -> WishlistItem {
        WishlistItem {
            id: ProductId::new("cassava"),
            title: "Cassava tubers".to_string(),
            price: Price::from_units(35),
            image: "cassava.jpg".to_string(),
        }
    }

    #[test]
    fn test_add_ignores_duplicates() {
        let list = Wishlist::default()
            .apply(WishlistAction::Add(cassava()))
            .apply(WishlistAction::Add(cassava()));
        assert_eq!(list.len(), 1);
        assert!(list.contains(&ProductId::new("cassava")));
    }

    #[test]
    fn test_remove_and_clear() {
        let list = Wishlist::default().apply(WishlistAction::Add(cassava()));
        assert!(list
            .clone()
            .apply(WishlistAction::Remove(ProductId::new("cassava")))
            .is_empty());
        assert!(list.apply(WishlistAction::Clear).is_empty());
    }

    #[test]
    fn test_store_persists_and_hydrates() {
        let storage = Storage::in_memory();
        let store = WishlistStore::hydrate(storage.clone());
        store.add(cassava());

        let reopened = WishlistStore::hydrate(storage.clone());
        assert_eq!(reopened.current().items(), &[cassava()]);

        store.clear();
        assert_eq!(storage.load::<Vec<WishlistItem>>(keys::WISHLIST), Some(vec![]));
    }

    #[test]
    fn test_malformed_storage_yields_empty_wishlist() {
        let storage = Storage::in_memory();
        storage.save(keys::WISHLIST, &42).unwrap();
        assert!(WishlistStore::hydrate(storage).current().is_empty());
    }

    #[test]
    fn test_stored_duplicates_are_merged() {
        let storage = Storage::in_memory();
        storage.save(keys::WISHLIST, &[cassava(), cassava()]).unwrap();
        assert_eq!(WishlistStore::hydrate(storage).current().len(), 1);
    }

    #[test]
    fn test_moves_into_cart_item() {
        let item: NewCartItem = cassava().into();
        assert_eq!(item.title, "Cassava tubers");
    }
}
