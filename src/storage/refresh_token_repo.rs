use crate::domain::auth::RefreshToken;
use crate::error::{AppError, Result};
use crate::storage::records::auth::RefreshTokenRecord;
use sqlx::{Executor, PgConnection, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct RefreshTokenRepository {}

impl RefreshTokenRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a new refresh-token record. Note: we store the HASH of the
    /// identifier, never the raw value.
    ///
    /// A unique violation on the hash column means the generator produced a
    /// colliding identifier, which should be unreachable; it is surfaced as
    /// an internal error rather than silently overwriting the existing row.
    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        token_hash: &str,
        fingerprint: &str,
        expires_at: OffsetDateTime,
    ) -> Result<()>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token_hash, fingerprint, expires_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(user_id)
        .bind(token_hash)
        .bind(fingerprint)
        .bind(expires_at)
        .execute(executor)
        .await
        .map_err(|e| {
            if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
                tracing::error!("Refresh identifier collision on insert");
                AppError::Internal
            } else {
                AppError::Database(e)
            }
        })?;

        Ok(())
    }

    /// Fetches the record matching BOTH the identifier hash and the
    /// fingerprint, locking the row for the rest of the transaction.
    ///
    /// `SKIP LOCKED` makes racing rotations resolve at the store: the loser
    /// sees no row at all and fails exactly like an unknown identifier. The
    /// row is not consumed here; the caller decides whether to delete it.
    pub async fn find_and_lock(
        &self,
        conn: &mut PgConnection,
        token_hash: &str,
        fingerprint: &str,
    ) -> Result<Option<RefreshToken>> {
        let record: Option<RefreshTokenRecord> = sqlx::query_as(
            r#"
            SELECT id, user_id, token_hash, fingerprint, created_at, expires_at, revoked_at
            FROM refresh_tokens
            WHERE token_hash = $1 AND fingerprint = $2
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(token_hash)
        .bind(fingerprint)
        .fetch_optional(&mut *conn)
        .await
        .map_err(AppError::Database)?;

        Ok(record.map(Into::into))
    }

    /// Identifier-only existence check, used solely for operator diagnostics
    /// when the (identifier, fingerprint) pair did not match.
    pub async fn identifier_exists(&self, conn: &mut PgConnection, token_hash: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE token_hash = $1)")
            .bind(token_hash)
            .fetch_one(&mut *conn)
            .await
            .map_err(AppError::Database)?;

        Ok(exists)
    }

    /// Consumes a locked record. Returns the number of rows removed so the
    /// caller can detect a rotation that lost the race.
    pub async fn delete_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<u64>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Deletes by exact (identifier hash, fingerprint) pair; used for logout.
    /// Deleting a missing row is not an error.
    pub async fn delete<'e, E>(&self, executor: E, token_hash: &str, fingerprint: &str) -> Result<u64>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1 AND fingerprint = $2")
            .bind(token_hash)
            .bind(fingerprint)
            .execute(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }

    /// Garbage-collects rows past their expiry. Expired tokens are rejected
    /// lazily on use; this only reclaims storage.
    pub async fn delete_expired(&self, conn: &mut PgConnection) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < now()")
            .execute(&mut *conn)
            .await
            .map_err(AppError::Database)?;

        Ok(result.rows_affected())
    }
}
