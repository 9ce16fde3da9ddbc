use crate::config::AuthConfig;
use crate::domain::auth::{Claims, OpaqueToken};
use crate::domain::auth_session::AuthSession;
use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::storage::DbPool;
use crate::storage::refresh_token_repo::RefreshTokenRepository;
use crate::storage::user_repo::UserRepository;
use opentelemetry::{global, metrics::Counter};
use sqlx::PgConnection;
use time::{Duration, OffsetDateTime};

#[derive(Clone, Debug)]
struct Metrics {
    login_total: Counter<u64>,
    refresh_total: Counter<u64>,
    logout_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("portcullis-server");
        Self {
            login_total: meter
                .u64_counter("auth_login_total")
                .with_description("Total number of successful login attempts")
                .build(),
            refresh_total: meter
                .u64_counter("auth_refresh_total")
                .with_description("Total number of successful token rotations")
                .build(),
            logout_total: meter
                .u64_counter("auth_logout_total")
                .with_description("Total number of logout requests that removed a session")
                .build(),
        }
    }
}

/// Orchestrates login, refresh-token rotation, logout, and access-token
/// identity resolution. Registration lives in `AccountService`.
#[derive(Clone, Debug)]
pub struct AuthService {
    config: AuthConfig,
    pool: DbPool,
    user_repo: UserRepository,
    refresh_repo: RefreshTokenRepository,
    metrics: Metrics,
}

impl AuthService {
    #[must_use]
    pub fn new(config: AuthConfig, pool: DbPool, user_repo: UserRepository, refresh_repo: RefreshTokenRepository) -> Self {
        Self { config, pool, user_repo, refresh_repo, metrics: Metrics::new() }
    }

    #[tracing::instrument(
        skip(self, email, password, fingerprint),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn login(&self, email: String, password: String, fingerprint: String) -> Result<AuthSession> {
        let mut conn = self.pool.acquire().await?;
        let Some(user) = self.user_repo.find_by_email(&mut *conn, &email).await? else {
            // Same error as a bad password; do not reveal which.
            tracing::debug!("Login rejected: unknown email");
            return Err(AppError::InvalidCredentials);
        };
        drop(conn);

        tracing::Span::current().record("user_id", tracing::field::display(user.id));

        if !self.verify_password(&password, &user.password_hash).await? {
            tracing::debug!("Login rejected: password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AppError::InactiveUser);
        }

        let mut tx = self.pool.begin().await?;
        let session = self.create_session(&mut tx, &user, &fingerprint).await?;
        tx.commit().await?;

        self.metrics.login_total.add(1, &[]);
        Ok(session)
    }

    /// Rotates a refresh token: the matched record is consumed and a fresh
    /// access/refresh pair is issued for the same user and fingerprint, all
    /// in one transaction. Any failure after the delete rolls the delete
    /// back, so a token is never lost to a half-applied rotation.
    #[tracing::instrument(
        skip(self, refresh_token, fingerprint),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn rotate(&self, refresh_token: String, fingerprint: String) -> Result<AuthSession> {
        let token_hash = OpaqueToken::hash(&refresh_token);

        let mut tx = self.pool.begin().await?;

        let Some(record) = self.refresh_repo.find_and_lock(&mut tx, &token_hash, &fingerprint).await? else {
            // Operator-only diagnostics; the caller sees the same error for
            // an unknown identifier and a fingerprint mismatch.
            if self.refresh_repo.identifier_exists(&mut tx, &token_hash).await? {
                tracing::warn!("Refresh rejected: identifier known but fingerprint mismatched or row contended");
            } else {
                tracing::debug!("Refresh rejected: unknown identifier");
            }
            return Err(AppError::InvalidRefreshToken);
        };

        tracing::Span::current().record("user_id", tracing::field::display(record.user_id));

        // Lazy expiry: the row is left untouched for the cleanup worker.
        if record.is_expired() {
            return Err(AppError::TokenExpired);
        }
        if record.is_revoked() {
            return Err(AppError::TokenRevoked);
        }

        let deleted = self.refresh_repo.delete_by_id(&mut *tx, record.id).await?;
        if deleted == 0 {
            return Err(AppError::InvalidRefreshToken);
        }

        let user = self.user_repo.find_by_id(&mut *tx, record.user_id).await?.ok_or(AppError::Internal)?;

        let session = self.create_session(&mut tx, &user, &fingerprint).await?;
        tx.commit().await?;

        tracing::info!("Tokens rotated successfully");
        self.metrics.refresh_total.add(1, &[]);
        Ok(session)
    }

    /// Deletes the session matching the (identifier, fingerprint) pair.
    /// Idempotent: logging out a nonexistent or already-expired session
    /// succeeds silently.
    #[tracing::instrument(skip(self, refresh_token, fingerprint), err(level = "warn"))]
    pub async fn logout(&self, refresh_token: String, fingerprint: String) -> Result<()> {
        let token_hash = OpaqueToken::hash(&refresh_token);
        let mut conn = self.pool.acquire().await?;

        let deleted = self.refresh_repo.delete(&mut *conn, &token_hash, &fingerprint).await?;
        if deleted > 0 {
            self.metrics.logout_total.add(1, &[]);
        } else {
            tracing::debug!("Logout matched no session");
        }

        Ok(())
    }

    /// Resolves a bearer access token into an active user. Invalid tokens,
    /// unknown subjects, and inactive users all collapse into the same
    /// error.
    pub async fn resolve_identity(&self, access_token: &str) -> Result<User> {
        let claims = Claims::decode(access_token, &self.config.jwt_secret)?;

        let mut conn = self.pool.acquire().await?;
        let user = self
            .user_repo
            .find_by_email(&mut *conn, &claims.sub)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !user.is_active {
            return Err(AppError::Unauthenticated);
        }

        Ok(user)
    }

    #[tracing::instrument(err, skip(self, password))]
    pub async fn hash_password(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        tokio::task::spawn_blocking(move || crate::domain::auth::Password::hash(&password))
            .await
            .map_err(|_| AppError::Internal)?
    }

    #[tracing::instrument(err, skip(self, password, password_hash))]
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();
        tokio::task::spawn_blocking(move || crate::domain::auth::Password::verify(&password, &password_hash))
            .await
            .map_err(|_| AppError::Internal)
    }

    /// Issues an access token (subject = email) and persists a new refresh
    /// record bound to the fingerprint, inside the caller's transaction.
    #[tracing::instrument(err, skip(self, conn, user, fingerprint), fields(user_id = %user.id))]
    pub async fn create_session(&self, conn: &mut PgConnection, user: &User, fingerprint: &str) -> Result<AuthSession> {
        let claims = Claims::new(&user.email, self.config.access_token_ttl_secs);
        let access_token = claims.encode(&self.config.jwt_secret)?;

        let refresh_token = OpaqueToken::generate();
        let token_hash = OpaqueToken::hash(&refresh_token);
        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.config.refresh_token_ttl_days);

        self.refresh_repo.create(&mut *conn, user.id, &token_hash, fingerprint, expires_at).await?;

        Ok(AuthSession { access_token, refresh_token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_service() -> AuthService {
        let config = AuthConfig {
            jwt_secret: "test_secret".to_string(),
            access_token_ttl_secs: 1800,
            refresh_token_ttl_days: 7,
            cleanup_interval_secs: 0,
        };
        let pool = sqlx::PgPool::connect_lazy("postgres://localhost/test").unwrap();
        AuthService::new(config, pool, UserRepository::new(), RefreshTokenRepository::new())
    }

    #[tokio::test]
    async fn test_password_hashing_through_service() {
        let service = setup_service();
        let password = "password12345";
        let hash = service.hash_password(password).await.unwrap();

        assert!(service.verify_password(password, &hash).await.unwrap());
        assert!(!service.verify_password("wrong_password", &hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_resolve_identity_rejects_garbage_token() {
        let service = setup_service();
        let result = service.resolve_identity("definitely-not-a-jwt").await;
        assert!(matches!(result, Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_refresh_identifiers_never_repeat() {
        let token1 = OpaqueToken::generate();
        let token2 = OpaqueToken::generate();

        assert_ne!(token1, token2);
        assert_eq!(OpaqueToken::hash(&token1), OpaqueToken::hash(&token1));
    }
}
