//! Auth handlers and supporting modules.
//!
//! This module coordinates password login, refresh-token rotation, and the
//! password-recovery flow.
//!
//! ## Token model
//!
//! Access tokens are short-lived, stateless bearer credentials; refresh
//! tokens live in an `HttpOnly` cookie and are rotated on every use. A
//! superseded refresh token presented again is treated as replay and revokes
//! the whole session for that subject.

pub(crate) mod login;
pub(crate) mod password;
pub(crate) mod principal;
pub(crate) mod session;
mod state;
pub mod types;
pub(crate) mod utils;

pub use session::REFRESH_COOKIE_NAME;
pub use state::{AuthConfig, AuthState};

#[cfg(test)]
mod tests;
