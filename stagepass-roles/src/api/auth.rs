//! Bearer token authentication
//!
//! `AuthenticatedAccount` is an extractor: any handler that names it requires
//! `Authorization: Bearer <token>` and receives the matching account. Handlers without
//! it (health) stay public.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use stagepass_common::api::{hash_api_token, parse_bearer, ApiAuthError};
use tracing::debug;

use crate::db::accounts;
use crate::error::WorkflowError;
use crate::models::Account;
use crate::AppState;

/// The account behind the request's bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount(pub Account);

impl From<ApiAuthError> for WorkflowError {
    fn from(err: ApiAuthError) -> Self {
        WorkflowError::Unauthenticated(err.to_string())
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedAccount {
    type Rejection = WorkflowError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| {
                value.to_str().map_err(|_| {
                    ApiAuthError::MalformedHeader("header is not valid ASCII".to_string())
                })
            })
            .transpose()?;

        let token = parse_bearer(header)?;
        let token_hash = hash_api_token(token);

        match accounts::find_by_token_hash(&state.db, &token_hash).await? {
            Some(account) => Ok(AuthenticatedAccount(account)),
            None => {
                debug!("Rejected request with unknown API token");
                Err(ApiAuthError::UnknownToken.into())
            }
        }
    }
}
