//! API module for shared HTTP API functionality
//!
//! Contains ONLY pure functions and shared types (no HTTP framework dependencies).
//! Each service wraps these with framework-specific extractors.

pub mod auth;

pub use auth::{generate_api_token, hash_api_token, parse_bearer, ApiAuthError};
