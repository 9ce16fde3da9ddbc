use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::auth::{Login, Logout, Refresh, Registration, StatusMessage, TokenPair, UserProfile};
use crate::domain::auth_session::AuthSession;
use crate::error::Result;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Registration>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.account_service.register(payload.email, payload.nickname, payload.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(StatusMessage { message: "User registered successfully".to_string() }),
    ))
}

pub async fn login(State(state): State<AppState>, Json(payload): Json<Login>) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.auth_service.login(payload.email, payload.password, payload.fingerprint).await?;
    Ok(Json(map_session(session)))
}

pub async fn refresh(State(state): State<AppState>, Json(payload): Json<Refresh>) -> Result<impl IntoResponse> {
    payload.validate()?;
    let session = state.auth_service.rotate(payload.refresh_token, payload.fingerprint).await?;
    Ok(Json(map_session(session)))
}

pub async fn logout(State(state): State<AppState>, Json(payload): Json<Logout>) -> Result<impl IntoResponse> {
    state.auth_service.logout(payload.refresh_token, payload.fingerprint).await?;
    Ok(Json(StatusMessage { message: "Logged out successfully".to_string() }))
}

pub async fn whoami(auth_user: AuthUser) -> Result<impl IntoResponse> {
    let user = auth_user.user;
    Ok(Json(UserProfile {
        id: user.id,
        email: user.email,
        nickname: user.nickname,
        is_active: user.is_active,
        created_at: user.created_at,
    }))
}

fn map_session(session: AuthSession) -> TokenPair {
    TokenPair {
        access_token: session.access_token,
        refresh_token: session.refresh_token,
        token_type: "bearer".to_string(),
    }
}
