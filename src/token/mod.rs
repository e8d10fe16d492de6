//! Signed session tokens and refresh rotation.
//!
//! Access tokens are stateless: validity is signature + expiry, no store
//! lookup. Refresh tokens carry a rotation generation that must match the
//! per-subject counter in the refresh session store; a mismatch is treated as
//! replay of a superseded token and revokes the whole session.

mod codec;
mod service;

pub use codec::{SessionTokenClaims, SessionTokenHeader, TokenKind, sign_hs256, verify_hs256};
pub use service::{TokenPair, TokenService};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid token format")]
    TokenFormat,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signing key")]
    InvalidKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("wrong token kind")]
    WrongKind,
    #[error("token expired")]
    Expired,
    #[error("invalid subject claim")]
    InvalidSubject,
    #[error("refresh token reuse detected")]
    Reused,
    #[error("refresh session revoked or unknown")]
    Revoked,
    #[error("token store error")]
    Store(#[from] anyhow::Error),
}

impl Error {
    /// True for failures the API boundary must collapse into a generic 401.
    ///
    /// Store errors are the only member of the taxonomy that surfaces as a
    /// server-side failure instead.
    #[must_use]
    pub fn is_session_invalid(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Seconds since the Unix epoch, saturating instead of panicking.
pub(crate) fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
