//! stagepass-roles library - role upgrade and KYC verification service
//!
//! Accounts ask to become artists or hosts; administrators verify the attached identity
//! evidence, then approve or reject the request. Every decision is audited and the
//! request owner is notified by email (and an optional webhook) after commit.

use axum::Router;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod documents;
pub mod error;
pub mod models;
pub mod notify;
pub mod permissions;
pub mod workflow;

pub use error::{Result, WorkflowError};
pub use workflow::RoleWorkflow;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 5780;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub workflow: RoleWorkflow,
}

impl AppState {
    pub fn new(db: SqlitePool, workflow: RoleWorkflow) -> Self {
        Self { db, workflow }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::role_request_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
