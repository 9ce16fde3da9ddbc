use portcullis_server::domain::auth::OpaqueToken;
use portcullis_server::error::AppError;
use portcullis_server::storage::refresh_token_repo::RefreshTokenRepository;
use time::{Duration, OffsetDateTime};

mod common;

const FINGERPRINT: &str = "device-fingerprint-1";

async fn register_and_login(
    account: &portcullis_server::services::account_service::AccountService,
    auth: &portcullis_server::services::auth_service::AuthService,
    run_id: &str,
) -> portcullis_server::domain::auth_session::AuthSession {
    let email = format!("rot_{run_id}@example.com");
    account
        .register(email.clone(), format!("rot_user_{run_id}"), "password1".to_string())
        .await
        .expect("registration should succeed");

    auth.login(email, "password1".to_string(), FINGERPRINT.to_string()).await.expect("login should succeed")
}

#[tokio::test]
async fn test_rotation_invalidates_old_token() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let session1 = register_and_login(&account, &auth, &common::run_id()).await;

    let session2 = auth
        .rotate(session1.refresh_token.clone(), FINGERPRINT.to_string())
        .await
        .expect("first rotation should succeed");

    assert_ne!(session1.refresh_token, session2.refresh_token, "refresh token should rotate");

    // The consumed token is gone; a replay fails like an unknown identifier.
    let result = auth.rotate(session1.refresh_token, FINGERPRINT.to_string()).await;
    assert!(matches!(result, Err(AppError::InvalidRefreshToken)));

    // The chain continues from the replacement.
    auth.rotate(session2.refresh_token, FINGERPRINT.to_string())
        .await
        .expect("rotation of the replacement should succeed");
}

#[tokio::test]
async fn test_wrong_fingerprint_fails_like_unknown_token() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let session = register_and_login(&account, &auth, &common::run_id()).await;

    let result = auth.rotate(session.refresh_token.clone(), "other-device-fp".to_string()).await;
    assert!(matches!(result, Err(AppError::InvalidRefreshToken)));

    let result = auth.rotate("completely-unknown-token".to_string(), FINGERPRINT.to_string()).await;
    assert!(matches!(result, Err(AppError::InvalidRefreshToken)));

    // The mismatch left the record untouched; the right pair still rotates.
    auth.rotate(session.refresh_token, FINGERPRINT.to_string())
        .await
        .expect("rotation with the correct fingerprint should still succeed");
}

#[tokio::test]
async fn test_expired_token_rejected_lazily() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let run_id = common::run_id();

    let user = account
        .register(format!("exp_{run_id}@example.com"), format!("exp_user_{run_id}"), "password1".to_string())
        .await
        .expect("registration should succeed");

    // Plant an otherwise-valid record that is already past its expiry.
    let refresh_token = OpaqueToken::generate();
    let token_hash = OpaqueToken::hash(&refresh_token);
    let repo = RefreshTokenRepository::new();
    repo.create(&pool, user.id, &token_hash, FINGERPRINT, OffsetDateTime::now_utc() - Duration::days(1))
        .await
        .expect("insert should succeed");

    let result = auth.rotate(refresh_token, FINGERPRINT.to_string()).await;
    assert!(matches!(result, Err(AppError::TokenExpired)));

    // Lazy rejection: the row is left in place for the cleanup worker.
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM refresh_tokens WHERE token_hash = $1")
        .bind(&token_hash)
        .fetch_one(&pool)
        .await
        .expect("count should succeed");
    assert_eq!(remaining, 1);
}

#[tokio::test]
async fn test_revoked_token_rejected() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let session = register_and_login(&account, &auth, &common::run_id()).await;

    // No code path writes revoked_at; mark the row directly to exercise the
    // check.
    let token_hash = OpaqueToken::hash(&session.refresh_token);
    sqlx::query("UPDATE refresh_tokens SET revoked_at = now() WHERE token_hash = $1")
        .bind(&token_hash)
        .execute(&pool)
        .await
        .expect("update should succeed");

    let result = auth.rotate(session.refresh_token, FINGERPRINT.to_string()).await;
    assert!(matches!(result, Err(AppError::TokenRevoked)));
}

#[tokio::test]
async fn test_logout_is_idempotent() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let session = register_and_login(&account, &auth, &common::run_id()).await;

    auth.logout(session.refresh_token.clone(), FINGERPRINT.to_string())
        .await
        .expect("first logout should succeed");
    auth.logout(session.refresh_token.clone(), FINGERPRINT.to_string())
        .await
        .expect("second logout should also succeed");

    let result = auth.rotate(session.refresh_token, FINGERPRINT.to_string()).await;
    assert!(matches!(result, Err(AppError::InvalidRefreshToken)));
}

#[tokio::test]
async fn test_concurrent_rotation_has_single_winner() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let session = register_and_login(&account, &auth, &common::run_id()).await;

    let (a, b) = tokio::join!(
        auth.rotate(session.refresh_token.clone(), FINGERPRINT.to_string()),
        auth.rotate(session.refresh_token.clone(), FINGERPRINT.to_string()),
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent rotation may win");

    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(AppError::InvalidRefreshToken)));
}
