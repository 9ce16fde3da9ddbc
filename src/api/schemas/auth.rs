use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 8;
const MIN_FINGERPRINT_LEN: usize = 8;
const NICKNAME_LEN: std::ops::RangeInclusive<usize> = 3..=50;

#[derive(Debug, Deserialize)]
pub struct Registration {
    pub email: String,
    pub nickname: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        if !NICKNAME_LEN.contains(&self.nickname.chars().count()) {
            return Err(AppError::BadRequest("nickname must be between 3 and 50 characters".to_string()));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::BadRequest("password must be at least 8 characters".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct Login {
    pub email: String,
    pub password: String,
    pub fingerprint: String,
}

impl Login {
    pub fn validate(&self) -> Result<()> {
        validate_email(&self.email)?;
        validate_fingerprint(&self.fingerprint)
    }
}

#[derive(Debug, Deserialize)]
pub struct Refresh {
    pub refresh_token: String,
    pub fingerprint: String,
}

impl Refresh {
    pub fn validate(&self) -> Result<()> {
        validate_fingerprint(&self.fingerprint)
    }
}

#[derive(Debug, Deserialize)]
pub struct Logout {
    pub refresh_token: String,
    pub fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct StatusMessage {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub nickname: String,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn validate_email(email: &str) -> Result<()> {
    // Deliverability is the mail server's problem; this only rejects values
    // that cannot possibly be an address.
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if valid { Ok(()) } else { Err(AppError::BadRequest("invalid email address".to_string())) }
}

fn validate_fingerprint(fingerprint: &str) -> Result<()> {
    if fingerprint.chars().count() < MIN_FINGERPRINT_LEN {
        return Err(AppError::BadRequest("fingerprint must be at least 8 characters".to_string()));
    }
    Ok(())
}
