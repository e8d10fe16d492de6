//! Narrow store interfaces consumed by the auth subsystem.
//!
//! The subsystem only needs an opaque user-record store, a per-subject refresh
//! session counter, and a single-use reset-token registry. Postgres backs all
//! three in production; the in-memory variants exist for tests and local runs
//! without a database.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// User credential record as seen by the auth subsystem.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    /// Argon2id hash in PHC string format.
    pub password_hash: String,
    pub status: String,
}

impl UserRecord {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == "active"
    }
}

/// Outcome of the atomic rotate-or-reject step on a refresh session.
#[derive(Debug, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Exactly one concurrent caller per generation observes this.
    Rotated { generation: u64 },
    /// The presented generation no longer matches the stored counter.
    Reused { latest: u64 },
    /// No live session for the subject (revoked, expired, or never issued).
    NotFound,
}

/// Outcome of a reset-token consume attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum ResetConsumeOutcome {
    Consumed { user_id: Uuid },
    NotFound,
    Expired,
    AlreadyUsed,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Look up a credential by normalized email.
    async fn lookup_by_email(&self, email: &str) -> Result<Option<UserRecord>>;

    /// Look up a credential by user id.
    async fn lookup_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>>;

    /// Replace the stored password hash. Returns false when the user is gone.
    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<bool>;
}

#[async_trait]
pub trait RefreshSessionStore: Send + Sync {
    /// Start (or restart) the subject's refresh session at generation 0.
    async fn start(&self, subject: Uuid, expires_at_unix: i64) -> Result<()>;

    /// Compare-and-set rotation: succeeds only if `presented_generation`
    /// matches the stored counter, which it then increments. Concurrent calls
    /// racing on the same generation must have exactly one winner.
    async fn rotate(
        &self,
        subject: Uuid,
        presented_generation: u64,
        expires_at_unix: i64,
        now_unix: i64,
    ) -> Result<RotationOutcome>;

    /// Drop the subject's refresh session entirely (logout-everywhere).
    async fn revoke(&self, subject: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ResetTokenStore: Send + Sync {
    /// Store a new reset-token hash, invalidating any outstanding unconsumed
    /// token for the same user (at most one live token per user).
    async fn put(&self, user_id: Uuid, token_hash: &[u8], expires_at_unix: i64) -> Result<()>;

    /// Atomically consume the token behind `token_hash`. Only one concurrent
    /// caller may observe `Consumed`; the consumed flag is permanent.
    async fn consume(&self, token_hash: &[u8], now_unix: i64) -> Result<ResetConsumeOutcome>;
}
