use crate::domain::user::User;
use crate::error::{AppError, Result};
use crate::services::auth_service::AuthService;
use crate::storage::DbPool;
use crate::storage::user_repo::UserRepository;
use opentelemetry::{global, metrics::Counter};

#[derive(Clone, Debug)]
struct Metrics {
    users_registered_total: Counter<u64>,
}

impl Metrics {
    fn new() -> Self {
        let meter = global::meter("portcullis-server");
        Self {
            users_registered_total: meter
                .u64_counter("users_registered_total")
                .with_description("Total number of successful user registrations")
                .build(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AccountService {
    pool: DbPool,
    user_repo: UserRepository,
    auth_service: AuthService,
    metrics: Metrics,
}

impl AccountService {
    #[must_use]
    pub fn new(pool: DbPool, user_repo: UserRepository, auth_service: AuthService) -> Self {
        Self { pool, user_repo, auth_service, metrics: Metrics::new() }
    }

    /// Registers a new user. The email is checked before the nickname, and
    /// both before the password is hashed, so a conflicting request never
    /// pays the argon2 cost. The insert still maps unique violations in case
    /// a concurrent registration wins the race.
    #[tracing::instrument(
        skip(self, email, nickname, password),
        fields(user_id = tracing::field::Empty),
        err(level = "warn")
    )]
    pub async fn register(&self, email: String, nickname: String, password: String) -> Result<User> {
        let mut conn = self.pool.acquire().await?;
        if self.user_repo.email_exists(&mut *conn, &email).await? {
            return Err(AppError::DuplicateEmail);
        }
        if self.user_repo.nickname_exists(&mut *conn, &nickname).await? {
            return Err(AppError::DuplicateNickname);
        }
        drop(conn);

        let password_hash = self.auth_service.hash_password(&password).await?;

        let mut tx = self.pool.begin().await?;
        let user = self.user_repo.create(&mut *tx, &email, &nickname, &password_hash).await?;
        tx.commit().await?;

        tracing::Span::current().record("user_id", tracing::field::display(user.id));
        tracing::info!("User registered successfully");
        self.metrics.users_registered_total.add(1, &[]);

        Ok(user)
    }
}
