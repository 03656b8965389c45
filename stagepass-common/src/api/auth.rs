//! API token authentication
//!
//! Clients send `Authorization: Bearer <token>`. Only the SHA-256 digest of a token
//! (64 lowercase hex characters) is ever stored; the plaintext token is shown once
//! when the account is created.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in a generated token (hex encoded to twice this length)
const TOKEN_BYTES: usize = 32;

// ========================================
// Error Types
// ========================================

/// Authentication error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiAuthError {
    /// No Authorization header present
    MissingCredentials,

    /// Authorization header present but not a usable bearer token
    MalformedHeader(String),

    /// Token does not belong to any account
    UnknownToken,
}

impl std::fmt::Display for ApiAuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiAuthError::MissingCredentials => write!(f, "Missing Authorization header"),
            ApiAuthError::MalformedHeader(reason) => {
                write!(f, "Malformed Authorization header: {}", reason)
            }
            ApiAuthError::UnknownToken => write!(f, "Invalid API token"),
        }
    }
}

impl std::error::Error for ApiAuthError {}

// ========================================
// Token Functions
// ========================================

/// Generate a fresh random API token (64 hex characters)
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 digest of a token as 64 lowercase hex characters
pub fn hash_api_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Extract the token from an `Authorization` header value
pub fn parse_bearer(header_value: Option<&str>) -> Result<&str, ApiAuthError> {
    let value = header_value.ok_or(ApiAuthError::MissingCredentials)?;
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or_else(|| ApiAuthError::MalformedHeader("expected '<scheme> <token>'".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(ApiAuthError::MalformedHeader(format!(
            "unsupported scheme '{}'",
            scheme
        )));
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(ApiAuthError::MalformedHeader("empty token".to_string()));
    }
    Ok(token)
}
