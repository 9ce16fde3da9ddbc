use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::records::user::UserRecord;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

#[derive(Clone, Debug, Default)]
pub struct UserRepository {}

impl UserRepository {
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// Inserts a new user. Unique violations are mapped to the matching
    /// conflict error in case a concurrent registration slipped past the
    /// existence checks.
    pub async fn create<'e, E>(&self, executor: E, email: &str, nickname: &str, password_hash: &str) -> Result<User>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO users (email, nickname, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, email, nickname, password_hash, is_active, created_at
            "#,
        )
        .bind(email)
        .bind(nickname)
        .bind(password_hash)
        .fetch_one(executor)
        .await
        .map_err(map_unique_violation)?;

        Ok(record.into())
    }

    pub async fn find_by_email<'e, E>(&self, executor: E, email: &str) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, nickname, password_hash, is_active, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(record.map(Into::into))
    }

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, email, nickname, password_hash, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::Database)?;

        Ok(record.map(Into::into))
    }

    pub async fn email_exists<'e, E>(&self, executor: E, email: &str) -> Result<bool>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(exists)
    }

    pub async fn nickname_exists<'e, E>(&self, executor: E, nickname: &str) -> Result<bool>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE nickname = $1)")
            .bind(nickname)
            .fetch_one(executor)
            .await
            .map_err(AppError::Database)?;

        Ok(exists)
    }
}

fn map_unique_violation(e: sqlx::Error) -> AppError {
    let constraint = match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => db.constraint().map(ToOwned::to_owned),
        _ => None,
    };

    match constraint.as_deref() {
        Some("users_email_key") => AppError::DuplicateEmail,
        Some("users_nickname_key") => AppError::DuplicateNickname,
        _ => AppError::Database(e),
    }
}
