//! Session/auth state machine.
//!
//! A session is either anonymous or authenticated with a user record and a
//! credential pair. The authenticated state always carries its user, so
//! "authenticated iff a user is present" holds by construction.
//!
//! [`SessionStore`] is the single owner of the session for one context. The
//! HTTP client reads credentials from it and writes rotated tokens back
//! through it; durable storage only mirrors what the store holds.

use chrono::{DateTime, Utc};
use harvest_market_core::{AccountStatus, Email, UserType};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::storage::{Storage, StorageError, keys};

/// The signed-in user as returned by the backend at login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: Email,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_type: UserType,
    #[serde(default)]
    pub status: AccountStatus,
    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Name to show in greetings.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.local_part().to_string()
        } else {
            full.to_string()
        }
    }
}

/// Access/refresh credential pair.
#[derive(Debug, Clone)]
pub struct Tokens {
    /// Short-lived bearer token attached to API calls.
    pub access: SecretString,
    /// Long-lived token exchanged for a new pair when `access` expires.
    pub refresh: Option<SecretString>,
}

impl Tokens {
    /// Build a pair from raw strings.
    #[must_use]
    pub fn new(access: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            access: SecretString::from(access.into()),
            refresh: refresh.map(SecretString::from),
        }
    }
}

/// Authentication state of a browsing context.
#[derive(Debug, Clone, Default)]
pub enum Session {
    #[default]
    Anonymous,
    Authenticated { user: User, tokens: Tokens },
}

/// State transitions accepted by the session.
#[derive(Debug, Clone)]
pub enum SessionAction {
    /// A successful login replaces the session wholesale.
    Login { user: User, tokens: Tokens },
    /// A refresh produced a new credential pair.
    RotateTokens(Tokens),
    /// The profile changed on the backend.
    UpdateUser(User),
    /// Forget the user and credentials.
    Logout,
}

impl Session {
    /// Apply one action, returning the next state.
    ///
    /// Token rotation and user updates only apply to an authenticated
    /// session. A rotation without a refresh token keeps the previous one.
    #[must_use]
    pub fn apply(self, action: SessionAction) -> Self {
        match (self, action) {
            (_, SessionAction::Login { user, tokens }) => Self::Authenticated { user, tokens },
            (_, SessionAction::Logout) => Self::Anonymous,
            (Self::Authenticated { user, tokens }, SessionAction::RotateTokens(next)) => {
                Self::Authenticated {
                    user,
                    tokens: Tokens {
                        access: next.access,
                        refresh: next.refresh.or(tokens.refresh),
                    },
                }
            }
            (Self::Authenticated { tokens, .. }, SessionAction::UpdateUser(user)) => {
                Self::Authenticated { user, tokens }
            }
            (Self::Anonymous, SessionAction::RotateTokens(_) | SessionAction::UpdateUser(_)) => {
                Self::Anonymous
            }
        }
    }

    /// Whether a user is signed in.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// The signed-in user.
    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated { user, .. } => Some(user),
            Self::Anonymous => None,
        }
    }

    /// Current credentials.
    #[must_use]
    pub const fn tokens(&self) -> Option<&Tokens> {
        match self {
            Self::Authenticated { tokens, .. } => Some(tokens),
            Self::Anonymous => None,
        }
    }

    /// Current bearer token.
    #[must_use]
    pub fn access_token(&self) -> Option<&SecretString> {
        self.tokens().map(|tokens| &tokens.access)
    }

    /// Current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&SecretString> {
        self.tokens().and_then(|tokens| tokens.refresh.as_ref())
    }
}

/// Credentials as seen by one outgoing request.
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Bearer token to attach, if any.
    pub access: Option<SecretString>,
    /// Refresh token available for renewal, if any.
    pub refresh: Option<SecretString>,
    /// Counter bumped on every session change; identifies the credentials a
    /// request was sent with.
    pub generation: u64,
}

/// Session together with its credential generation.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub session: Session,
    pub generation: u64,
}

/// The session of one browsing context, mirrored to durable storage.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct SessionStore {
    state: watch::Sender<SessionSnapshot>,
    storage: Storage,
}

impl SessionStore {
    /// Create a store hydrated from durable storage.
    ///
    /// Absent or unparseable entries yield an anonymous session. A stored user
    /// without an access token is an invalid session: its entries are removed
    /// and the session starts anonymous.
    #[must_use]
    pub fn hydrate(storage: Storage) -> Self {
        let session = read_session(&storage);
        if !session.is_authenticated() && keys::AUTH.iter().any(|key| storage.contains(key)) {
            warn!("Discarding incomplete stored session");
            if let Err(e) = clear_auth(&storage) {
                error!(error = %e, "Failed to clear stored session");
            }
        }

        let (state, _) = watch::channel(SessionSnapshot {
            session,
            generation: 0,
        });
        Self { state, storage }
    }

    /// Apply an action, persist the result and notify observers.
    ///
    /// Returns the new session.
    pub fn dispatch(&self, action: SessionAction) -> Session {
        debug!(action = action_name(&action), "Session action");
        let mut next = Session::Anonymous;
        self.state.send_modify(|state| {
            state.session = std::mem::take(&mut state.session).apply(action);
            state.generation += 1;
            if let Err(e) = persist(&self.storage, &state.session) {
                error!(error = %e, "Failed to persist session");
            }
            next = state.session.clone();
        });
        next
    }

    /// Re-read a session another context wrote, without writing it back.
    pub fn resync(&self) -> Session {
        let session = read_session(&self.storage);
        self.state.send_modify(|state| {
            state.session = session.clone();
            state.generation += 1;
        });
        session
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn current(&self) -> Session {
        self.state.borrow().session.clone()
    }

    /// Whether a user is signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().session.is_authenticated()
    }

    /// Credentials for the next outgoing request.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        let state = self.state.borrow();
        Credentials {
            access: state.session.access_token().cloned(),
            refresh: state.session.refresh_token().cloned(),
            generation: state.generation,
        }
    }

    /// Current credential generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }

    /// Observe session changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.subscribe()
    }
}

const fn action_name(action: &SessionAction) -> &'static str {
    match action {
        SessionAction::Login { .. } => "login",
        SessionAction::RotateTokens(_) => "rotate_tokens",
        SessionAction::UpdateUser(_) => "update_user",
        SessionAction::Logout => "logout",
    }
}

/// Read the session described by durable storage.
fn read_session(storage: &Storage) -> Session {
    let user = storage.load::<User>(keys::USER);
    let access = storage.load::<String>(keys::ACCESS_TOKEN);
    let refresh = storage.load::<String>(keys::REFRESH_TOKEN);

    match (user, access) {
        (Some(user), Some(access)) if !access.is_empty() => Session::Authenticated {
            user,
            tokens: Tokens::new(access, refresh.filter(|token| !token.is_empty())),
        },
        _ => Session::Anonymous,
    }
}

/// Mirror `session` into durable storage.
fn persist(storage: &Storage, session: &Session) -> Result<(), StorageError> {
    match session {
        Session::Authenticated { user, tokens } => {
            storage.save(keys::USER, user)?;
            storage.save(keys::ACCESS_TOKEN, tokens.access.expose_secret())?;
            match &tokens.refresh {
                Some(refresh) => storage.save(keys::REFRESH_TOKEN, refresh.expose_secret()),
                None => storage.remove(keys::REFRESH_TOKEN),
            }
        }
        Session::Anonymous => clear_auth(storage),
    }
}

fn clear_auth(storage: &Storage) -> Result<(), StorageError> {
    for key in keys::AUTH {
        storage.remove(key)?;
    }
    Ok(())
}
