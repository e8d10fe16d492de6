//! In-memory store implementations.
//!
//! Used by tests and database-free local runs. Atomicity comes from holding
//! the mutex across the whole read-compare-write step, mirroring the
//! compare-and-set statements the Postgres variants issue.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    CredentialStore, RefreshSessionStore, ResetConsumeOutcome, ResetTokenStore, RotationOutcome,
    UserRecord,
};

#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<HashMap<Uuid, UserRecord>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a credential record; replaces any record with the same id.
    pub async fn insert(&self, record: UserRecord) {
        let mut users = self.users.lock().await;
        users.insert(record.id, record);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn lookup_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>> {
        let users = self.users.lock().await;
        Ok(users.get(&user_id).cloned())
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<bool> {
        let mut users = self.users.lock().await;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

struct RefreshSessionEntry {
    generation: u64,
    expires_at_unix: i64,
}

#[derive(Default)]
pub struct MemoryRefreshSessionStore {
    sessions: Mutex<HashMap<Uuid, RefreshSessionEntry>>,
}

impl MemoryRefreshSessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshSessionStore for MemoryRefreshSessionStore {
    async fn start(&self, subject: Uuid, expires_at_unix: i64) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            subject,
            RefreshSessionEntry {
                generation: 0,
                expires_at_unix,
            },
        );
        Ok(())
    }

    async fn rotate(
        &self,
        subject: Uuid,
        presented_generation: u64,
        expires_at_unix: i64,
        now_unix: i64,
    ) -> Result<RotationOutcome> {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, entry| entry.expires_at_unix > now_unix);

        let Some(entry) = sessions.get_mut(&subject) else {
            return Ok(RotationOutcome::NotFound);
        };
        if entry.generation != presented_generation {
            return Ok(RotationOutcome::Reused {
                latest: entry.generation,
            });
        }
        entry.generation += 1;
        entry.expires_at_unix = expires_at_unix;
        Ok(RotationOutcome::Rotated {
            generation: entry.generation,
        })
    }

    async fn revoke(&self, subject: Uuid) -> Result<()> {
        let mut sessions = self.sessions.lock().await;
        sessions.remove(&subject);
        Ok(())
    }
}

struct ResetTokenEntry {
    user_id: Uuid,
    expires_at_unix: i64,
    consumed: bool,
}

#[derive(Default)]
pub struct MemoryResetTokenStore {
    tokens: Mutex<HashMap<Vec<u8>, ResetTokenEntry>>,
}

impl MemoryResetTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResetTokenStore for MemoryResetTokenStore {
    async fn put(&self, user_id: Uuid, token_hash: &[u8], expires_at_unix: i64) -> Result<()> {
        let mut tokens = self.tokens.lock().await;
        // At most one live token per user: consume any outstanding ones.
        for entry in tokens.values_mut() {
            if entry.user_id == user_id && !entry.consumed {
                entry.consumed = true;
            }
        }
        tokens.insert(
            token_hash.to_vec(),
            ResetTokenEntry {
                user_id,
                expires_at_unix,
                consumed: false,
            },
        );
        Ok(())
    }

    async fn consume(&self, token_hash: &[u8], now_unix: i64) -> Result<ResetConsumeOutcome> {
        let mut tokens = self.tokens.lock().await;
        let Some(entry) = tokens.get_mut(token_hash) else {
            return Ok(ResetConsumeOutcome::NotFound);
        };
        // Consumed wins over expired so replay of a used token is always
        // reported as such, regardless of age.
        if entry.consumed {
            return Ok(ResetConsumeOutcome::AlreadyUsed);
        }
        if entry.expires_at_unix <= now_unix {
            return Ok(ResetConsumeOutcome::Expired);
        }
        entry.consumed = true;
        Ok(ResetConsumeOutcome::Consumed {
            user_id: entry.user_id,
        })
    }
}
