use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user is inactive")]
    InactiveUser,
    #[error("invalid refresh token or fingerprint")]
    InvalidRefreshToken,
    #[error("refresh token expired")]
    TokenExpired,
    #[error("refresh token revoked")]
    TokenRevoked,
    #[error("authentication required")]
    Unauthenticated,
    #[error("email already registered")]
    DuplicateEmail,
    #[error("nickname already taken")]
    DuplicateNickname,
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("internal server error")]
    Internal,
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    /// Status code and response body for this error.
    ///
    /// Every authentication failure collapses to the same 401 body so that a
    /// caller cannot distinguish an unknown identifier from a fingerprint
    /// mismatch, an expired token, or a bad password. The sub-condition is
    /// for operator logs only.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Database(_) | Self::Internal => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            Self::InvalidCredentials
            | Self::InvalidRefreshToken
            | Self::TokenExpired
            | Self::TokenRevoked
            | Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Self::InactiveUser => (StatusCode::FORBIDDEN, "User is inactive".to_string()),
            Self::DuplicateEmail => (StatusCode::CONFLICT, "Email already registered".to_string()),
            Self::DuplicateNickname => (StatusCode::CONFLICT, "Nickname already taken".to_string()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error");
            }
            AppError::Internal => {
                tracing::error!("Internal server error occurred");
            }
            AppError::InvalidCredentials
            | AppError::InvalidRefreshToken
            | AppError::TokenExpired
            | AppError::TokenRevoked
            | AppError::Unauthenticated => {
                tracing::debug!(reason = %self, "Authentication failed");
            }
            AppError::InactiveUser => {
                tracing::debug!("Login blocked: user is inactive");
            }
            AppError::DuplicateEmail | AppError::DuplicateNickname => {
                tracing::debug!(reason = %self, "Registration conflict");
            }
            AppError::BadRequest(msg) => {
                tracing::debug!(message = %msg, "Bad request");
            }
        }

        let (status, message) = self.status_and_message();
        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
