use portcullis_server::error::AppError;

mod common;

#[tokio::test]
async fn test_register_then_login() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let run_id = common::run_id();
    let email = format!("reg_{run_id}@example.com");

    let user = account
        .register(email.clone(), format!("reg_user_{run_id}"), "password1".to_string())
        .await
        .expect("registration should succeed");

    assert_eq!(user.email, email);
    assert!(user.is_active);

    // Wrong password and unknown email fail with the same variant.
    let result = auth.login(email.clone(), "wrong_password".to_string(), "fingerprint-1".to_string()).await;
    assert!(matches!(result, Err(AppError::InvalidCredentials)));

    let result = auth
        .login(format!("nobody_{run_id}@example.com"), "password1".to_string(), "fingerprint-1".to_string())
        .await;
    assert!(matches!(result, Err(AppError::InvalidCredentials)));

    let session = auth
        .login(email.clone(), "password1".to_string(), "fingerprint-1".to_string())
        .await
        .expect("login should succeed");

    assert!(!session.access_token.is_empty());
    assert!(!session.refresh_token.is_empty());
}

#[tokio::test]
async fn test_duplicate_email_rejected() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, _) = common::build_services(&pool);
    let run_id = common::run_id();
    let email = format!("dupe_{run_id}@example.com");

    account
        .register(email.clone(), format!("dupe_user_a_{run_id}"), "password1".to_string())
        .await
        .expect("first registration should succeed");

    // Same email, different nickname: still a conflict on the email.
    let result = account.register(email, format!("dupe_user_b_{run_id}"), "password2".to_string()).await;
    assert!(matches!(result, Err(AppError::DuplicateEmail)));
}

#[tokio::test]
async fn test_duplicate_nickname_rejected() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, _) = common::build_services(&pool);
    let run_id = common::run_id();
    let nickname = format!("nick_{run_id}");

    account
        .register(format!("nick_a_{run_id}@example.com"), nickname.clone(), "password1".to_string())
        .await
        .expect("first registration should succeed");

    let result = account.register(format!("nick_b_{run_id}@example.com"), nickname, "password1".to_string()).await;
    assert!(matches!(result, Err(AppError::DuplicateNickname)));
}

#[tokio::test]
async fn test_inactive_user_cannot_authenticate() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let run_id = common::run_id();
    let email = format!("inactive_{run_id}@example.com");

    account
        .register(email.clone(), format!("inactive_user_{run_id}"), "password1".to_string())
        .await
        .expect("registration should succeed");

    let session = auth
        .login(email.clone(), "password1".to_string(), "fingerprint-1".to_string())
        .await
        .expect("login should succeed while active");

    sqlx::query("UPDATE users SET is_active = FALSE WHERE email = $1")
        .bind(&email)
        .execute(&pool)
        .await
        .expect("deactivation should succeed");

    // Identity confirmed but blocked: Forbidden, not Unauthenticated.
    let result = auth.login(email, "password1".to_string(), "fingerprint-1".to_string()).await;
    assert!(matches!(result, Err(AppError::InactiveUser)));

    // A still-valid access token no longer resolves.
    let result = auth.resolve_identity(&session.access_token).await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
}

#[tokio::test]
async fn test_access_token_resolves_identity() {
    let Some(pool) = common::try_test_pool().await else { return };
    let (account, auth) = common::build_services(&pool);
    let run_id = common::run_id();
    let email = format!("whoami_{run_id}@example.com");
    let nickname = format!("whoami_user_{run_id}");

    account
        .register(email.clone(), nickname.clone(), "password1".to_string())
        .await
        .expect("registration should succeed");

    let session = auth
        .login(email.clone(), "password1".to_string(), "fingerprint-1".to_string())
        .await
        .expect("login should succeed");

    let user = auth.resolve_identity(&session.access_token).await.expect("access token should resolve");
    assert_eq!(user.email, email);
    assert_eq!(user.nickname, nickname);

    let result = auth.resolve_identity("not-a-token").await;
    assert!(matches!(result, Err(AppError::Unauthenticated)));
}
