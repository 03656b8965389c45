//! Administrator endpoints: request list/detail and the two workflow actions
//!
//! The action endpoints take HTML form fields (`action`, `notes`) and answer with an
//! [`ActionResponse`]. A refused approval (KYC not verified) is reported in that same
//! shape with `success: false` so form clients can show the message as-is.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::Deserialize;

use super::ActionResponse;
use crate::api::auth::AuthenticatedAccount;
use crate::error::{Result, WorkflowError};
use crate::models::{RequestId, RequestStatus, UpgradeRequest};
use crate::workflow::{KycDecision, Outcome, RequestDetail, RoleDecision};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

/// Form body of both action endpoints
#[derive(Debug, Deserialize)]
pub struct ActionForm {
    pub action: String,
    #[serde(default)]
    pub notes: String,
}

/// GET /api/role-requests?status=
pub async fn list_role_requests(
    State(state): State<AppState>,
    AuthenticatedAccount(admin): AuthenticatedAccount,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<UpgradeRequest>>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(str::parse::<RequestStatus>)
        .transpose()?;
    Ok(Json(state.workflow.list_requests(&admin, status).await?))
}

/// GET /api/role-requests/:id
pub async fn get_role_request(
    State(state): State<AppState>,
    AuthenticatedAccount(admin): AuthenticatedAccount,
    Path(id): Path<RequestId>,
) -> Result<Json<RequestDetail>> {
    Ok(Json(state.workflow.request_detail(&admin, id).await?))
}

/// POST /role-requests/:id/verify-kyc
pub async fn verify_kyc(
    State(state): State<AppState>,
    AuthenticatedAccount(admin): AuthenticatedAccount,
    Path(id): Path<RequestId>,
    Form(form): Form<ActionForm>,
) -> Result<Json<ActionResponse>> {
    let decision: KycDecision = form.action.parse()?;
    let outcome = state
        .workflow
        .process_kyc(&admin, id, decision, &form.notes)
        .await?;

    let message = match (&outcome, decision) {
        (Outcome::Applied(_), KycDecision::Verify) => format!("KYC verified for request #{}", id),
        (Outcome::Applied(_), KycDecision::Reject) => format!("KYC rejected for request #{}", id),
        (Outcome::Unchanged(_), _) => already_processed(id),
    };
    Ok(Json(ActionResponse::ok(message, outcome.into_request())))
}

/// POST /role-requests/:id/process
pub async fn process_role_request(
    State(state): State<AppState>,
    AuthenticatedAccount(admin): AuthenticatedAccount,
    Path(id): Path<RequestId>,
    Form(form): Form<ActionForm>,
) -> Result<Response> {
    let decision: RoleDecision = form.action.parse()?;
    let outcome = match state
        .workflow
        .process_role_request(&admin, id, decision, &form.notes)
        .await
    {
        Ok(outcome) => outcome,
        Err(WorkflowError::PreconditionFailed(message)) => {
            let body = ActionResponse {
                success: false,
                message,
                request: None,
            };
            return Ok((StatusCode::CONFLICT, Json(body)).into_response());
        }
        Err(e) => return Err(e),
    };

    let message = match (&outcome, decision) {
        (Outcome::Applied(_), RoleDecision::Approve) => format!("Request #{} approved", id),
        (Outcome::Applied(_), RoleDecision::Reject) => format!("Request #{} rejected", id),
        (Outcome::Unchanged(_), _) => already_processed(id),
    };
    Ok(Json(ActionResponse::ok(message, outcome.into_request())).into_response())
}

fn already_processed(id: RequestId) -> String {
    format!("Request #{} was already processed; nothing changed", id)
}
