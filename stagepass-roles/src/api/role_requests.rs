//! Account-facing endpoints: profile, request submission, own requests, cancellation

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use super::ActionResponse;
use crate::api::auth::AuthenticatedAccount;
use crate::error::Result;
use crate::models::{Account, AccountId, RequestId, Role, UpgradeRequest};
use crate::permissions::{Permission, Privilege};
use crate::workflow::RoleRequestSubmission;
use crate::AppState;

/// Account as shown to its owner
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub id: AccountId,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub display_role: &'static str,
    pub privilege: Privilege,
    pub is_artist: bool,
    pub is_host: bool,
    pub has_dual_role: bool,
    pub can_create_events: bool,
    pub can_upload_reels: bool,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            display_name: account.display_name.clone(),
            role: account.role(),
            display_role: account.display_role(),
            privilege: account.privilege(),
            is_artist: account.is_artist,
            is_host: account.is_host,
            has_dual_role: account.has_dual_role(),
            can_create_events: account.can(Permission::CreateEvents),
            can_upload_reels: account.can(Permission::UploadReels),
        }
    }
}

/// GET /api/me
pub async fn get_me(AuthenticatedAccount(account): AuthenticatedAccount) -> Json<AccountView> {
    Json(AccountView::from(&account))
}

/// POST /api/role-requests
pub async fn create_role_request(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Json(submission): Json<RoleRequestSubmission>,
) -> Result<(StatusCode, Json<UpgradeRequest>)> {
    let request = state.workflow.submit_request(&account, submission).await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /api/role-requests/mine
pub async fn my_role_requests(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> Result<Json<Vec<UpgradeRequest>>> {
    Ok(Json(state.workflow.my_requests(&account).await?))
}

/// POST /api/role-requests/:id/cancel
pub async fn cancel_role_request(
    State(state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<RequestId>,
) -> Result<Json<ActionResponse>> {
    let request = state.workflow.cancel_request(&account, id).await?;
    Ok(Json(ActionResponse::ok(
        format!("Request #{} canceled", id),
        request,
    )))
}
