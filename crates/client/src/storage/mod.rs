//! Durable client storage.
//!
//! A small key-value store holding JSON-encoded strings, the way a browser
//! keeps `localStorage`. Everything the client must remember across restarts
//! lives here under the keys in [`keys`]: credentials, the signed-in user, the
//! cart, the wishlist and the local order history.
//!
//! # Contexts
//!
//! Several [`Storage`] handles can share one backend, each acting as a
//! separate browsing context (a tab, a window, a second CLI session). Every
//! write publishes a [`StorageEvent`] tagged with the writing context;
//! [`StorageChanges`] delivers only the events written by *other* contexts, so
//! a context never reacts to its own writes.
//!
//! Stored values are a synchronization sink: state lives in the stores, and
//! unreadable entries are logged and treated as absent rather than surfaced.

pub mod file;
pub mod memory;

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Storage keys shared by every context.
pub mod keys {
    /// Current bearer access token.
    pub const ACCESS_TOKEN: &str = "accessToken";

    /// Long-lived refresh token.
    pub const REFRESH_TOKEN: &str = "refreshToken";

    /// Serialized signed-in user record.
    pub const USER: &str = "user";

    /// Serialized cart line items.
    pub const CART: &str = "cart";

    /// Serialized local order history.
    pub const ORDERS: &str = "orders";

    /// Serialized wishlist.
    pub const WISHLIST: &str = "wishlist";

    /// Keys describing the session.
    pub const AUTH: [&str; 3] = [ACCESS_TOKEN, REFRESH_TOKEN, USER];
}

/// Capacity of the change-signal channel shared by all contexts.
const EVENT_CAPACITY: usize = 64;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The value could not be encoded as JSON.
    #[error("failed to serialize value for key '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// The stored value is not valid JSON for the requested type.
    #[error("malformed value stored under '{key}': {source}")]
    Malformed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Keys are limited to ASCII letters, digits, `-` and `_`.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// A writer panicked while holding the in-memory map.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Raw string key-value backend.
pub trait StorageBackend: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key succeeds.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Identity of one browsing context sharing a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(Uuid);

impl ContextId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

/// A change made to shared storage by some context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    /// Key that changed. `None` means any key may have changed.
    pub key: Option<String>,
    /// Context that made the change.
    pub origin: ContextId,
}

impl StorageEvent {
    /// Whether this event may concern `key`.
    #[must_use]
    pub fn affects(&self, key: &str) -> bool {
        self.key.as_deref().is_none_or(|changed| changed == key)
    }
}

/// Handle to durable storage for one browsing context.
///
/// Cloning keeps the same context; use [`Storage::open_context`] to model a
/// second tab.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn StorageBackend>,
    events: broadcast::Sender<StorageEvent>,
    context: ContextId,
}

impl Storage {
    /// Wrap a backend in a fresh context.
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend: Arc::new(backend),
            events,
            context: ContextId::generate(),
        }
    }

    /// Storage that lives only as long as the process.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Open another context over the same backend and change signals.
    #[must_use]
    pub fn open_context(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            events: self.events.clone(),
            context: ContextId::generate(),
        }
    }

    /// This handle's context.
    #[must_use]
    pub const fn context(&self) -> ContextId {
        self.context
    }

    /// Load and decode the value under `key`.
    ///
    /// Missing keys yield `None`. Unreadable or malformed entries are logged
    /// and also yield `None`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.try_load(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "Ignoring unreadable stored value");
            None
        })
    }

    /// Load and decode the value under `key`, reporting unreadable entries.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Malformed` if the entry does not decode as `T`,
    /// or the backend's error if it cannot be read.
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.backend.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Malformed {
                key: key.to_string(),
                source,
            })
    }

    /// Encode `value` as JSON and store it under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the backend write fails.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Serialize {
            key: key.to_string(),
            source,
        })?;
        self.backend.set(key, &raw)?;
        self.notify(Some(key));
        Ok(())
    }

    /// Delete the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend write fails.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove(key)?;
        self.notify(Some(key));
        Ok(())
    }

    /// Whether a value is stored under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        matches!(self.backend.get(key), Ok(Some(_)))
    }

    /// Subscribe to changes made by other contexts.
    #[must_use]
    pub fn changes(&self) -> StorageChanges {
        StorageChanges {
            rx: self.events.subscribe(),
            context: self.context,
        }
    }

    fn notify(&self, key: Option<&str>) {
        // No subscribers is not an error.
        let _ = self.events.send(StorageEvent {
            key: key.map(str::to_string),
            origin: self.context,
        });
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Stream of storage changes made by other contexts.
pub struct StorageChanges {
    rx: broadcast::Receiver<StorageEvent>,
    context: ContextId,
}

impl StorageChanges {
    /// Wait for the next change from another context.
    ///
    /// Returns `None` once every [`Storage`] handle has been dropped. If this
    /// subscriber fell behind, a catch-all event (`key: None`) is returned in
    /// place of the missed ones.
    pub async fn next(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.origin == self.context => {}
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Storage change subscriber lagged");
                    return Some(StorageEvent {
                        key: None,
                        origin: self.context,
                    });
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Reject keys that could escape a storage directory.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}
