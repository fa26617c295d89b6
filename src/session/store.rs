use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::storage::TokenStorage;
use crate::types::User;

/// Client-side authentication state.
///
/// `Anonymous → Authenticating → Authenticated → Expired | Anonymous`.
/// `Expired` is only entered when a refresh fails; an explicit logout
/// returns to `Anonymous`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStatus {
    Anonymous,
    Authenticating,
    Authenticated(User),
    Expired,
}

impl AuthStatus {
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// In-memory token plus the session generation it belongs to.
///
/// The generation changes whenever the session is replaced or cleared from
/// outside a refresh, so a refresh that started under an older session can
/// tell that its result is stale.
#[derive(Debug, Default)]
struct TokenSlot {
    token: Option<String>,
    generation: u64,
}

/// Single source of truth for the access token and the current user.
///
/// The token lives in memory and in durable [`TokenStorage`] under a fixed
/// key. Clearing does not navigate anywhere; that is the caller's job.
pub struct SessionStore {
    storage: Arc<dyn TokenStorage>,
    token_key: String,
    slot: RwLock<TokenSlot>,
    // Serializes durable writes against the generation check.
    persist: Mutex<()>,
    user: RwLock<Option<User>>,
    status: watch::Sender<AuthStatus>,
}

impl SessionStore {
    /// Create an empty store backed by `storage`. Nothing is read from
    /// storage until [`load_stored`](Self::load_stored) is called.
    #[must_use]
    pub fn new(storage: Arc<dyn TokenStorage>, token_key: impl Into<String>) -> Self {
        let (status, _) = watch::channel(AuthStatus::Anonymous);
        Self {
            storage,
            token_key: token_key.into(),
            slot: RwLock::new(TokenSlot::default()),
            persist: Mutex::new(()),
            user: RwLock::new(None),
            status,
        }
    }

    /// Store a token in memory and durable storage, starting a new session
    /// generation.
    ///
    /// Memory is updated first. A storage failure is logged; the in-memory
    /// token still takes effect.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        let generation = {
            let mut slot = self.slot.write();
            slot.token = Some(token.clone());
            slot.generation += 1;
            slot.generation
        };
        self.persist_token(generation, &token);
    }

    /// Replace the token only if the session is still at `generation`.
    /// Returns `false`, leaving the store untouched, if it moved on.
    pub(crate) fn set_token_if(&self, generation: u64, token: &str) -> bool {
        {
            let mut slot = self.slot.write();
            if slot.generation != generation {
                return false;
            }
            slot.token = Some(token.to_owned());
        }
        self.persist_token(generation, token);
        true
    }

    fn persist_token(&self, generation: u64, token: &str) {
        let _persist = self.persist.lock();
        // A later set or clear owns the durable value now.
        if self.slot.read().generation != generation {
            return;
        }
        if let Err(e) = self.storage.set(&self.token_key, token) {
            tracing::warn!(error = %e, "Failed to persist access token");
        }
    }

    /// The in-memory token, if any.
    #[must_use]
    pub fn current_token(&self) -> Option<String> {
        self.slot.read().token.clone()
    }

    /// The in-memory token together with the current session generation.
    pub(crate) fn snapshot(&self) -> (Option<String>, u64) {
        let slot = self.slot.read();
        (slot.token.clone(), slot.generation)
    }

    /// Read the durable token into memory. Returns the loaded token.
    ///
    /// Unreadable storage is treated as empty.
    pub fn load_stored(&self) -> Option<String> {
        let stored = match self.storage.get(&self.token_key) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored access token");
                None
            }
        };
        if let Some(token) = &stored {
            let mut slot = self.slot.write();
            slot.token = Some(token.clone());
            slot.generation += 1;
        }
        stored
    }

    /// Remove token and user from memory and storage, and go `Anonymous`.
    pub fn clear(&self) {
        self.forget(None);
        self.status.send_replace(AuthStatus::Anonymous);
    }

    /// Like [`clear`](Self::clear), but publishes [`AuthStatus::Expired`].
    pub fn mark_expired(&self) {
        self.forget(None);
        self.status.send_replace(AuthStatus::Expired);
    }

    /// [`mark_expired`](Self::mark_expired) only if the session is still at
    /// `generation`. Returns whether it expired the session.
    pub(crate) fn mark_expired_if(&self, generation: u64) -> bool {
        if !self.forget(Some(generation)) {
            return false;
        }
        self.status.send_replace(AuthStatus::Expired);
        true
    }

    fn forget(&self, expected: Option<u64>) -> bool {
        {
            let mut slot = self.slot.write();
            if expected.is_some_and(|g| g != slot.generation) {
                return false;
            }
            slot.token = None;
            slot.generation += 1;
        }
        *self.user.write() = None;
        let _persist = self.persist.lock();
        if let Err(e) = self.storage.remove(&self.token_key) {
            tracing::warn!(error = %e, "Failed to remove stored access token");
        }
        true
    }

    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.user.read().clone()
    }

    /// Record the confirmed user and go `Authenticated`.
    pub fn set_user(&self, user: User) {
        *self.user.write() = Some(user.clone());
        self.status.send_replace(AuthStatus::Authenticated(user));
    }

    pub(crate) fn begin_authenticating(&self) {
        self.status.send_replace(AuthStatus::Authenticating);
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.status.borrow().clone()
    }

    /// Subscribe to status changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.status.subscribe()
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("token_key", &self.token_key)
            .field("has_token", &self.slot.read().token.is_some())
            .field("user", &*self.user.read())
            .finish_non_exhaustive()
    }
}
