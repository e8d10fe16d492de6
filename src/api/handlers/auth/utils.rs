//! Small helpers for credential validation and reset-token handling.

use anyhow::{Context, Result};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng as SaltOsRng},
};
use base64::Engine;
use rand::{RngCore, rngs::OsRng};
use regex::Regex;
use sha2::{Digest, Sha256};

/// Parseable Argon2 hash that matches no password; verified for unknown
/// identifiers so both login paths do comparable work.
const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

/// Normalize an identifier for lookup/uniqueness checks.
pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(crate) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Minimum bar for new passwords; full policy lives with the frontend.
pub(crate) fn valid_new_password(password: &str) -> bool {
    password.len() >= 8
}

/// Hash a password into PHC string format for storage.
pub(crate) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut SaltOsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a password against a stored PHC hash. Unparseable hashes verify as
/// false rather than surfacing an error to the login path.
pub(crate) fn verify_password(password_hash: &str, password: &str) -> bool {
    PasswordHash::new(password_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Burn the same work as a real verification for unknown identifiers.
pub(crate) fn equalize_verify_work(password: &str) {
    let _ = verify_password(DUMMY_PASSWORD_HASH, password);
}

/// Create a new password-reset token.
/// The raw value is only delivered out-of-band; the store keeps a hash.
pub(crate) fn generate_reset_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate reset token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash a reset token so raw values never touch the store.
pub(crate) fn hash_reset_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn password_hash_round_trip() -> anyhow::Result<()> {
        let hash = hash_password("AdminPassword123!")?;
        assert!(verify_password(&hash, "AdminPassword123!"));
        assert!(!verify_password(&hash, "wrong-password"));
        Ok(())
    }

    #[test]
    fn unparseable_hash_verifies_false() {
        assert!(!verify_password("not-a-phc-string", "anything"));
    }

    #[test]
    fn dummy_hash_parses_but_matches_nothing() {
        assert!(PasswordHash::new(DUMMY_PASSWORD_HASH).is_ok());
        assert!(!verify_password(DUMMY_PASSWORD_HASH, "AdminPassword123!"));
    }

    #[test]
    fn generate_reset_token_is_32_random_bytes() {
        let decoded_len = generate_reset_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn hash_reset_token_stable() {
        let first = hash_reset_token("token");
        let second = hash_reset_token("token");
        let different = hash_reset_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }
}
