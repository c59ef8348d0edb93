//! JWT access token issuance and validation
//! Access tokens are stateless: HS512-signed, short-lived, never stored

use crate::{config::JwtConfig, error::AppError};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user email)
    pub sub: String,

    /// User role, e.g. `ROLE_USER`
    pub role: String,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,
}

/// JWT service
///
/// The signing key is decoded once from configuration and held for the
/// lifetime of the service.
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_token_exp_secs: u64,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &JwtConfig) -> Result<Self, AppError> {
        let secret = config.decode_secret_key()?;

        let mut validation = Validation::new(Algorithm::HS512);
        // Expiry is checked against an explicit clock in `decode_claims_at`
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(&secret),
            decoding_key: DecodingKey::from_secret(&secret),
            validation,
            access_token_exp_secs: config.access_token_exp_secs,
        })
    }

    /// Access token lifetime in seconds
    pub fn access_token_exp_secs(&self) -> u64 {
        self.access_token_exp_secs
    }

    /// Generate access token
    pub fn create_access_token(&self, subject: &str, role: &str) -> Result<String, AppError> {
        self.create_access_token_at(subject, role, Utc::now())
    }

    /// Generate access token as if issued at `issued_at`
    pub fn create_access_token_at(
        &self,
        subject: &str,
        role: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AppError> {
        let expiration = issued_at + Duration::seconds(self.access_token_exp_secs as i64);

        let claims = Claims {
            sub: subject.to_string(),
            role: role.to_string(),
            iat: issued_at.timestamp(),
            exp: expiration.timestamp(),
        };

        encode(&Header::new(Algorithm::HS512), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            AppError::Internal(format!("Failed to encode access token: {}", e))
        })
    }

    /// Decode and verify a token against the current time
    pub fn decode_claims(&self, token: &str) -> Result<Claims, AppError> {
        self.decode_claims_at(token, Utc::now())
    }

    /// Decode and verify a token against `now`
    pub fn decode_claims_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::authentication("Invalid access token")
            })?
            .claims;

        if now.timestamp() >= claims.exp {
            tracing::debug!(exp = claims.exp, "Token expired");
            return Err(AppError::authentication("Access token has expired"));
        }

        Ok(claims)
    }

    /// Whether the token is well-formed, correctly signed and unexpired
    pub fn validate(&self, token: &str) -> bool {
        self.validate_at(token, Utc::now())
    }

    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> bool {
        self.decode_claims_at(token, now).is_ok()
    }

    /// Subject (email) of a valid token
    pub fn subject_of(&self, token: &str) -> Result<String, AppError> {
        self.decode_claims(token).map(|claims| claims.sub)
    }
}
