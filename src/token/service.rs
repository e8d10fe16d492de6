//! Token issuance, rotation, and validation.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::warn;
use ulid::Ulid;
use uuid::Uuid;

use crate::store::{RefreshSessionStore, RotationOutcome};

use super::{
    Error,
    codec::{SessionTokenClaims, TokenKind, sign_hs256, verify_hs256},
    unix_now,
};

/// Freshly minted access + refresh token pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints and validates signed session tokens and owns refresh rotation.
///
/// Constructed once at the composition root and shared via `Arc`; the signing
/// key never leaves this service.
pub struct TokenService {
    signing_key: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
    refresh_sessions: Arc<dyn RefreshSessionStore>,
}

impl TokenService {
    #[must_use]
    pub fn new(
        signing_key: SecretString,
        access_ttl_seconds: i64,
        refresh_ttl_seconds: i64,
        refresh_sessions: Arc<dyn RefreshSessionStore>,
    ) -> Self {
        Self {
            signing_key,
            access_ttl_seconds,
            refresh_ttl_seconds,
            refresh_sessions,
        }
    }

    /// Mint a fresh token pair for a subject, restarting its refresh session
    /// at generation 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store write or signing fails.
    pub async fn issue(&self, subject: Uuid) -> Result<TokenPair, Error> {
        let now = unix_now();
        self.refresh_sessions
            .start(subject, now + self.refresh_ttl_seconds)
            .await?;
        self.mint_pair(subject, 0, now)
    }

    /// Exchange a refresh token for a new pair, rotating the generation.
    ///
    /// Presenting a superseded generation is treated as replay: the subject's
    /// whole refresh session is revoked before the error is returned, so
    /// detection and invalidation cannot drift apart.
    ///
    /// # Errors
    ///
    /// `Expired`/signature errors for stale or forged tokens, `Reused` after
    /// replay detection, `Revoked` when no live session backs the token.
    pub async fn refresh(&self, presented: &str) -> Result<(Uuid, TokenPair), Error> {
        let now = unix_now();
        let claims = verify_hs256(
            presented,
            self.signing_key.expose_secret().as_bytes(),
            TokenKind::Refresh,
            now,
        )?;
        let subject = Uuid::parse_str(&claims.sub).map_err(|_| Error::InvalidSubject)?;
        let generation = claims.gen.ok_or(Error::TokenFormat)?;

        let outcome = self
            .refresh_sessions
            .rotate(subject, generation, now + self.refresh_ttl_seconds, now)
            .await?;

        match outcome {
            RotationOutcome::Rotated { generation } => {
                Ok((subject, self.mint_pair(subject, generation, now)?))
            }
            RotationOutcome::Reused { latest } => {
                warn!(
                    %subject,
                    presented = generation,
                    latest,
                    "refresh token reuse detected, revoking all sessions"
                );
                self.refresh_sessions.revoke(subject).await?;
                Err(Error::Reused)
            }
            RotationOutcome::NotFound => Err(Error::Revoked),
        }
    }

    /// Validate an access token: pure signature + expiry check, no store
    /// lookup.
    ///
    /// # Errors
    ///
    /// Returns `Expired` past the expiry and a signature/format error for
    /// anything else that fails to verify.
    pub fn validate_access(&self, token: &str) -> Result<Uuid, Error> {
        let claims = verify_hs256(
            token,
            self.signing_key.expose_secret().as_bytes(),
            TokenKind::Access,
            unix_now(),
        )?;
        Uuid::parse_str(&claims.sub).map_err(|_| Error::InvalidSubject)
    }

    /// Resolve the subject of a refresh token without rotating it.
    ///
    /// Used by logout, where the token is about to be revoked anyway.
    ///
    /// # Errors
    ///
    /// Same failures as any refresh-token verification.
    pub fn refresh_subject(&self, token: &str) -> Result<Uuid, Error> {
        let claims = verify_hs256(
            token,
            self.signing_key.expose_secret().as_bytes(),
            TokenKind::Refresh,
            unix_now(),
        )?;
        Uuid::parse_str(&claims.sub).map_err(|_| Error::InvalidSubject)
    }

    /// Invalidate every refresh-token generation for a subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store write fails.
    pub async fn revoke(&self, subject: Uuid) -> Result<(), Error> {
        self.refresh_sessions.revoke(subject).await?;
        Ok(())
    }

    #[must_use]
    pub fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }

    fn mint_pair(&self, subject: Uuid, generation: u64, now: i64) -> Result<TokenPair, Error> {
        let key = self.signing_key.expose_secret().as_bytes();
        let access = SessionTokenClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.access_ttl_seconds,
            jti: Ulid::new().to_string(),
            kind: TokenKind::Access,
            gen: None,
        };
        let refresh = SessionTokenClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.refresh_ttl_seconds,
            jti: Ulid::new().to_string(),
            kind: TokenKind::Refresh,
            gen: Some(generation),
        };
        Ok(TokenPair {
            access_token: sign_hs256(key, &access)?,
            refresh_token: sign_hs256(key, &refresh)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRefreshSessionStore;

    fn service() -> TokenService {
        TokenService::new(
            SecretString::from("unit-test-signing-key"),
            900,
            7 * 24 * 60 * 60,
            Arc::new(MemoryRefreshSessionStore::new()),
        )
    }

    #[tokio::test]
    async fn issue_then_validate_access_resolves_subject() -> Result<(), Error> {
        let service = service();
        let subject = Uuid::new_v4();
        let pair = service.issue(subject).await?;
        assert_eq!(service.validate_access(&pair.access_token)?, subject);
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rotates_and_old_token_is_reuse() -> Result<(), Error> {
        let service = service();
        let subject = Uuid::new_v4();
        let first = service.issue(subject).await?;

        let (refreshed_subject, second) = service.refresh(&first.refresh_token).await?;
        assert_eq!(refreshed_subject, subject);

        // Replay of the superseded token fails and revokes the session, so
        // the previously-valid rotated token dies with it.
        let replay = service.refresh(&first.refresh_token).await;
        assert!(matches!(replay, Err(Error::Reused)));

        let after_revoke = service.refresh(&second.refresh_token).await;
        assert!(matches!(after_revoke, Err(Error::Revoked)));
        Ok(())
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() -> Result<(), Error> {
        let service = service();
        let pair = service.issue(Uuid::new_v4()).await?;
        let result = service.refresh(&pair.access_token).await;
        assert!(matches!(result, Err(Error::WrongKind)));
        Ok(())
    }

    #[tokio::test]
    async fn validate_access_rejects_refresh_tokens() -> Result<(), Error> {
        let service = service();
        let pair = service.issue(Uuid::new_v4()).await?;
        let result = service.validate_access(&pair.refresh_token);
        assert!(matches!(result, Err(Error::WrongKind)));
        Ok(())
    }

    #[tokio::test]
    async fn revoke_invalidates_outstanding_refresh_tokens() -> Result<(), Error> {
        let service = service();
        let subject = Uuid::new_v4();
        let pair = service.issue(subject).await?;
        service.revoke(subject).await?;

        let result = service.refresh(&pair.refresh_token).await;
        assert!(matches!(result, Err(Error::Revoked)));
        Ok(())
    }

    #[tokio::test]
    async fn login_restarts_generation() -> Result<(), Error> {
        let service = service();
        let subject = Uuid::new_v4();
        let first = service.issue(subject).await?;
        let _ = service.refresh(&first.refresh_token).await?;

        // A fresh login resets the counter; the rotated token from the old
        // session no longer matches.
        let second = service.issue(subject).await?;
        let (_, rotated) = service.refresh(&second.refresh_token).await?;
        assert!(!rotated.refresh_token.is_empty());
        Ok(())
    }
}
