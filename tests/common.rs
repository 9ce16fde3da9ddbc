#![allow(dead_code)]

use portcullis_server::config::AuthConfig;
use portcullis_server::services::account_service::AccountService;
use portcullis_server::services::auth_service::AuthService;
use portcullis_server::storage::refresh_token_repo::RefreshTokenRepository;
use portcullis_server::storage::user_repo::UserRepository;
use portcullis_server::storage::{self, DbPool};
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("portcullis_server=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Connects to the database named by `TEST_DATABASE_URL` and runs migrations.
/// Returns `None` (so the calling test can skip) when the variable is unset.
pub async fn try_test_pool() -> Option<DbPool> {
    setup_tracing();
    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping database-backed test");
        return None;
    };

    let pool = storage::init_pool(&database_url).await.expect("Failed to connect to test database");
    storage::run_migrations(&pool).await.expect("Failed to run migrations");

    Some(pool)
}

pub fn test_auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: "test_secret".to_string(),
        access_token_ttl_secs: 1800,
        refresh_token_ttl_days: 7,
        cleanup_interval_secs: 0,
    }
}

pub fn build_services(pool: &DbPool) -> (AccountService, AuthService) {
    let user_repo = UserRepository::new();
    let refresh_repo = RefreshTokenRepository::new();
    let auth_service = AuthService::new(test_auth_config(), pool.clone(), user_repo.clone(), refresh_repo);
    let account_service = AccountService::new(pool.clone(), user_repo, auth_service.clone());
    (account_service, auth_service)
}

/// Short unique suffix so tests can re-run against a dirty database.
pub fn run_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}
