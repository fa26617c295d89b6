//! Authenticated request dispatch with transparent token refresh.
//!
//! # Flow
//!
//! ```text
//! Attach ─► Dispatch ─► 2xx ───────────────────────────► Ok
//!                   ├─► 4xx/5xx (not 401), transport ──► Err (unchanged)
//!                   └─► 401 ─┬─ refresh endpoint ──────► Err
//!                            ├─ no token attached ─────► Err(Unauthenticated)
//!                            └─ Refreshing ─┬─ failed ─► Err(SessionExpired), session cleared
//!                                           └─ ok ─────► Retry ─► Ok / Err (final)
//! ```

mod client;
mod navigator;
mod request;

pub use client::Gateway;
#[cfg(feature = "resources")]
pub(crate) use client::ensure_success;
pub use navigator::Navigator;
pub use request::ApiRequest;
