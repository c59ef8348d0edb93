//! Authentication-related models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Signup request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, max = 128, message = "password must not be empty"))]
    pub password: String,
    /// Display name; defaults to the local part of the email
    #[validate(length(min = 1, max = 50, message = "username must be 1-50 characters"))]
    pub username: Option<String>,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Login / reissue response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Seconds until the access token expires
    pub expires_in: u64,
    pub username: String,
    pub email: String,
}

/// Token reissue request
#[derive(Debug, Clone, Deserialize)]
pub struct TokenReissueRequest {
    pub refresh_token: String,
}

/// Password reset request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "current_password must not be empty"))]
    pub current_password: String,
    #[validate(length(min = 1, max = 128, message = "new_password must not be empty"))]
    pub new_password: String,
}

/// Persisted refresh token; one row per owner email
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub email: String,
    /// SHA-256 of the opaque token value
    pub token_hash: String,
    pub issued_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    /// Whether the record is older than `ttl_secs` at `now`
    pub fn is_expired_at(&self, ttl_secs: u64, now: DateTime<Utc>) -> bool {
        self.issued_at + chrono::Duration::seconds(ttl_secs as i64) <= now
    }
}
