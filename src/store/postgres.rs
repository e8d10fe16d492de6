//! Postgres-backed store implementations.
//!
//! Rotation and consume are single-statement compare-and-sets so concurrent
//! callers racing on the same token have exactly one winner; the losing
//! caller classifies its failure with a follow-up read.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{
    CredentialStore, RefreshSessionStore, ResetConsumeOutcome, ResetTokenStore, RotationOutcome,
    UserRecord,
};

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn lookup_by_email(&self, email: &str) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, email, password_hash, status::text AS status
            FROM users
            WHERE email = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credential by email")?;

        Ok(row.map(|row| UserRecord {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            status: row.get("status"),
        }))
    }

    async fn lookup_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>> {
        let query = r"
            SELECT id, email, password_hash, status::text AS status
            FROM users
            WHERE id = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup credential by id")?;

        Ok(row.map(|row| UserRecord {
            id: row.get("id"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            status: row.get("status"),
        }))
    }

    async fn update_password_hash(&self, user_id: Uuid, password_hash: &str) -> Result<bool> {
        let query = r"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to update password hash")?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct PgRefreshSessionStore {
    pool: PgPool,
}

impl PgRefreshSessionStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshSessionStore for PgRefreshSessionStore {
    async fn start(&self, subject: Uuid, expires_at_unix: i64) -> Result<()> {
        // Login replaces any previous session outright; the counter restarts
        // at generation 0.
        let query = r"
            INSERT INTO refresh_sessions (user_id, generation, expires_at)
            VALUES ($1, 0, to_timestamp($2))
            ON CONFLICT (user_id) DO UPDATE
            SET generation = 0, expires_at = to_timestamp($2), rotated_at = NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(subject)
            .bind(expires_at_unix)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to start refresh session")?;
        Ok(())
    }

    async fn rotate(
        &self,
        subject: Uuid,
        presented_generation: u64,
        expires_at_unix: i64,
        now_unix: i64,
    ) -> Result<RotationOutcome> {
        let presented = i64::try_from(presented_generation).unwrap_or(i64::MAX);
        let query = r"
            UPDATE refresh_sessions
            SET generation = generation + 1,
                rotated_at = NOW(),
                expires_at = to_timestamp($3)
            WHERE user_id = $1
              AND generation = $2
              AND expires_at > to_timestamp($4)
            RETURNING generation
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject)
            .bind(presented)
            .bind(expires_at_unix)
            .bind(now_unix)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to rotate refresh session")?;

        if let Some(row) = row {
            let generation: i64 = row.get("generation");
            return Ok(RotationOutcome::Rotated {
                generation: u64::try_from(generation).unwrap_or_default(),
            });
        }

        // The CAS lost: classify against the live row, if any.
        let query = r"
            SELECT generation
            FROM refresh_sessions
            WHERE user_id = $1
              AND expires_at > to_timestamp($2)
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(subject)
            .bind(now_unix)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to classify refresh rotation failure")?;

        Ok(row.map_or(RotationOutcome::NotFound, |row| {
            let latest: i64 = row.get("generation");
            RotationOutcome::Reused {
                latest: u64::try_from(latest).unwrap_or_default(),
            }
        }))
    }

    async fn revoke(&self, subject: Uuid) -> Result<()> {
        // Revoke is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM refresh_sessions WHERE user_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(subject)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to revoke refresh session")?;
        Ok(())
    }
}

pub struct PgResetTokenStore {
    pool: PgPool,
}

impl PgResetTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResetTokenStore for PgResetTokenStore {
    async fn put(&self, user_id: Uuid, token_hash: &[u8], expires_at_unix: i64) -> Result<()> {
        // Transaction keeps "invalidate outstanding" and "insert new" as one
        // step so there is never more than one live token per user.
        let mut tx = self.pool.begin().await.context("begin reset-token put")?;

        let query = r"
            UPDATE password_reset_tokens
            SET consumed_at = NOW()
            WHERE user_id = $1
              AND consumed_at IS NULL
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to invalidate outstanding reset tokens")?;

        let query = r"
            INSERT INTO password_reset_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, to_timestamp($3))
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(expires_at_unix)
            .execute(&mut *tx)
            .instrument(span)
            .await
            .context("failed to insert reset token")?;

        tx.commit().await.context("commit reset-token put")?;
        Ok(())
    }

    async fn consume(&self, token_hash: &[u8], now_unix: i64) -> Result<ResetConsumeOutcome> {
        let query = r"
            SELECT id,
                   user_id,
                   (consumed_at IS NOT NULL) AS consumed,
                   (expires_at <= to_timestamp($2)) AS expired
            FROM password_reset_tokens
            WHERE token_hash = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(now_unix)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup reset token")?;

        let Some(row) = row else {
            return Ok(ResetConsumeOutcome::NotFound);
        };
        let consumed: bool = row.get("consumed");
        if consumed {
            return Ok(ResetConsumeOutcome::AlreadyUsed);
        }
        let expired: bool = row.get("expired");
        if expired {
            return Ok(ResetConsumeOutcome::Expired);
        }

        // CAS on the consumed flag: a concurrent consumer that won between the
        // read above and this write leaves zero rows to update here.
        let id: Uuid = row.get("id");
        let query = r"
            UPDATE password_reset_tokens
            SET consumed_at = NOW()
            WHERE id = $1
              AND consumed_at IS NULL
            RETURNING user_id
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to consume reset token")?;

        Ok(row.map_or(ResetConsumeOutcome::AlreadyUsed, |row| {
            ResetConsumeOutcome::Consumed {
                user_id: row.get("user_id"),
            }
        }))
    }
}
