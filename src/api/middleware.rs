use crate::api::AppState;
use crate::domain::user::User;
use crate::error::AppError;
use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, Request, header, request::Parts},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

/// Extractor for protected routes: resolves the bearer access token into an
/// active user or rejects with the uniform authentication failure.
#[derive(Debug)]
pub struct AuthUser {
    pub user: User,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts.headers.get(header::AUTHORIZATION).ok_or(AppError::Unauthenticated)?;
        let auth_str = auth_header.to_str().map_err(|_| AppError::Unauthenticated)?;
        let token = auth_str.strip_prefix("Bearer ").ok_or(AppError::Unauthenticated)?;

        let user = state.auth_service.resolve_identity(token).await?;

        Ok(Self { user })
    }
}

/// Request-id maker: reuses an incoming x-request-id, otherwise mints a UUID.
#[derive(Clone, Copy, Debug)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &Request<B>) -> Option<RequestId> {
        if let Some(id) = request.headers().get("x-request-id") {
            return Some(RequestId::new(id.clone()));
        }
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok().map(RequestId::new)
    }
}
