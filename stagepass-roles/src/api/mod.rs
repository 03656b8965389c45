//! HTTP API handlers

pub mod admin;
pub mod auth;
pub mod health;
pub mod role_requests;

use axum::{
    routing::{get, post},
    Router,
};
use serde::Serialize;

pub use auth::AuthenticatedAccount;
pub use health::health_routes;

use crate::models::UpgradeRequest;
use crate::AppState;

/// Body returned by the state-changing endpoints
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub request: Option<UpgradeRequest>,
}

impl ActionResponse {
    pub fn ok(message: String, request: UpgradeRequest) -> Self {
        Self {
            success: true,
            message,
            request: Some(request),
        }
    }
}

/// Authenticated routes; each handler extracts [`AuthenticatedAccount`]
pub fn role_request_routes() -> Router<AppState> {
    Router::new()
        .route("/api/me", get(role_requests::get_me))
        .route(
            "/api/role-requests",
            get(admin::list_role_requests).post(role_requests::create_role_request),
        )
        .route("/api/role-requests/mine", get(role_requests::my_role_requests))
        .route("/api/role-requests/:id", get(admin::get_role_request))
        .route(
            "/api/role-requests/:id/cancel",
            post(role_requests::cancel_role_request),
        )
        .route("/role-requests/:id/verify-kyc", post(admin::verify_kyc))
        .route("/role-requests/:id/process", post(admin::process_role_request))
}
