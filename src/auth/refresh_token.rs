//! Opaque refresh token generation

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};

/// Number of random bytes behind each refresh token
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Refresh token generator
pub struct RefreshTokenGenerator;

impl RefreshTokenGenerator {
    /// Generate a new refresh token
    /// Format: 64 CSPRNG bytes, URL-safe base64 without padding (86 chars)
    pub fn generate() -> String {
        let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);

        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Hash a refresh token for storage using SHA-256
    pub fn hash(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}
