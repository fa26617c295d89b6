#![doc = include_str!("../README.md")]

#[cfg(feature = "resources")]
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod guard;
pub mod session;
pub mod types;

// Re-exports for convenient access
#[cfg(feature = "resources")]
pub use api::RfpApi;
pub use auth::{AuthContext, validate_credentials, validate_registration};
pub use config::ClientConfig;
pub use error::{Error, ErrorKind};
pub use gateway::{ApiRequest, Gateway, Navigator};
pub use guard::{Access, dashboard_for};
#[cfg(feature = "file-storage")]
pub use session::FileStorage;
pub use session::{AuthStatus, MemoryStorage, SessionStore, TokenStorage};
pub use types::{Role, User, UserId};
