//! Session state: the access token, the current user, and durable storage.

mod storage;
mod store;

#[cfg(feature = "file-storage")]
pub use storage::FileStorage;
pub use storage::{MemoryStorage, TokenStorage};
pub use store::{AuthStatus, SessionStore};
