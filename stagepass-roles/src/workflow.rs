//! Role upgrade workflow controller
//!
//! Orchestrates every state change of an upgrade request:
//!
//! 1. authorize the caller
//! 2. load the request inside a transaction and apply the in-memory transition
//! 3. persist it with a compare-and-set, grant the capability (approve only) and append
//!    the audit entry, all in that same transaction
//! 4. commit, then hand the audit entry to the notification dispatcher
//!
//! A request that is already terminal, a KYC decision matching the current KYC state, or
//! a compare-and-set lost to a concurrent writer yields [`Outcome::Unchanged`] with no
//! writes, audit entry or notification.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use stagepass_common::time;
use std::str::FromStr;
use tracing::{info, warn};

use crate::db::{accounts, audit, requests};
use crate::documents::{DocumentStore, DocumentUpload};
use crate::error::{Result, WorkflowError};
use crate::models::{
    Account, AuditAction, KycAuditEntry, KycEvidence, NewUpgradeRequest, RequestId,
    RequestStatus, RequestType, Transition, UpgradeRequest, CANCELED_MARKER,
};
use crate::notify::{Notice, NotificationDispatcher};
use crate::permissions::{authorize, Permission};

/// Result of an admin action
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Applied(UpgradeRequest),
    /// Nothing changed; carries the request as currently stored
    Unchanged(UpgradeRequest),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn request(&self) -> &UpgradeRequest {
        match self {
            Outcome::Applied(r) | Outcome::Unchanged(r) => r,
        }
    }

    pub fn into_request(self) -> UpgradeRequest {
        match self {
            Outcome::Applied(r) | Outcome::Unchanged(r) => r,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KycDecision {
    Verify,
    Reject,
}

impl FromStr for KycDecision {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "verify" => Ok(KycDecision::Verify),
            "reject" => Ok(KycDecision::Reject),
            other => Err(WorkflowError::Validation(format!(
                "Invalid KYC action '{}': expected verify or reject",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleDecision {
    Approve,
    Reject,
}

impl FromStr for RoleDecision {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "approve" => Ok(RoleDecision::Approve),
            "reject" => Ok(RoleDecision::Reject),
            other => Err(WorkflowError::Validation(format!(
                "Invalid action '{}': expected approve or reject",
                other
            ))),
        }
    }
}

/// Request creation input as submitted by the owner
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleRequestSubmission {
    pub request_type: String,
    pub reason: String,
    #[serde(default)]
    pub kyc_id_type: Option<String>,
    #[serde(default)]
    pub kyc_id_number: Option<String>,
    #[serde(default)]
    pub kyc_document: Option<DocumentUpload>,
}

/// Admin view of one request
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetail {
    pub request: UpgradeRequest,
    pub owner: Option<Account>,
    /// Most recent first
    pub audit_log: Vec<KycAuditEntry>,
}

#[derive(Clone)]
pub struct RoleWorkflow {
    db: SqlitePool,
    dispatcher: NotificationDispatcher,
    documents: DocumentStore,
}

fn not_found(id: RequestId) -> WorkflowError {
    WorkflowError::NotFound(format!("Role request {} not found", id))
}

impl RoleWorkflow {
    pub fn new(db: SqlitePool, dispatcher: NotificationDispatcher, documents: DocumentStore) -> Self {
        Self {
            db,
            dispatcher,
            documents,
        }
    }

    pub fn dispatcher(&self) -> &NotificationDispatcher {
        &self.dispatcher
    }

    /// Create a pending request for `owner`
    pub async fn submit_request(
        &self,
        owner: &Account,
        submission: RoleRequestSubmission,
    ) -> Result<UpgradeRequest> {
        let evidence = KycEvidence {
            id_type: submission.kyc_id_type,
            id_number: submission.kyc_id_number,
            document: None,
        };
        let mut new =
            NewUpgradeRequest::new(owner.id, &submission.request_type, &submission.reason, evidence)?;

        let capability = new.request_type.capability();
        if owner.holds(capability) {
            return Err(WorkflowError::Validation(format!(
                "Your account already has the {} role",
                capability
            )));
        }
        if requests::has_pending_request(&self.db, owner.id, new.request_type).await? {
            return Err(duplicate_pending(new.request_type));
        }

        if let Some(upload) = &submission.kyc_document {
            new.evidence.document = Some(self.documents.store(upload).await?);
        }
        let stored_document = new.evidence.document.clone();
        let request_type = new.request_type;

        match requests::insert_request(&self.db, new, time::now()).await {
            Ok(request) => {
                info!(
                    request_id = request.id,
                    account_id = owner.id,
                    request_type = %request.request_type,
                    kyc_evidence = request.has_kyc_evidence(),
                    "Role request submitted"
                );
                Ok(request)
            }
            Err(e) => {
                if let Some(reference) = &stored_document {
                    self.documents.discard(reference).await;
                }
                if e.is_unique_violation() {
                    Err(duplicate_pending(request_type))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// Owner withdraws a pending request
    pub async fn cancel_request(&self, requester: &Account, id: RequestId) -> Result<UpgradeRequest> {
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;
        let mut request = requests::load_request(&mut *tx, id)
            .await?
            .ok_or_else(|| not_found(id))?;

        let now = time::now();
        request.cancel(requester.id, now)?;

        if !requests::update_status(&mut *tx, &request, RequestStatus::Pending).await? {
            tx.rollback().await?;
            return Err(WorkflowError::Forbidden(
                "Only pending requests can be canceled".to_string(),
            ));
        }
        let entry = audit::record(
            &mut *tx,
            id,
            AuditAction::RequestCanceled,
            Some(requester.id),
            CANCELED_MARKER,
            now,
        )
        .await?;
        tx.commit().await?;

        info!(request_id = id, account_id = requester.id, "Role request canceled by owner");
        self.dispatcher.dispatch(Notice {
            account: requester.clone(),
            request: request.clone(),
            entry,
        });
        Ok(request)
    }

    /// Verify or reject the KYC evidence of a pending request
    pub async fn process_kyc(
        &self,
        admin: &Account,
        id: RequestId,
        decision: KycDecision,
        notes: &str,
    ) -> Result<Outcome> {
        authorize(admin, Permission::ProcessRoleRequests)?;

        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;
        let mut request = requests::load_request(&mut *tx, id)
            .await?
            .ok_or_else(|| not_found(id))?;

        let previous_kyc = request.kyc_status;
        let verified = decision == KycDecision::Verify;
        let now = time::now();

        if request.verify_kyc(admin.id, verified, notes, now) == Transition::Unchanged {
            tx.rollback().await?;
            info!(
                request_id = id,
                status = %request.status,
                kyc_status = %request.kyc_status,
                "KYC decision already applied; nothing to do"
            );
            return Ok(Outcome::Unchanged(request));
        }
        if verified && !request.has_kyc_evidence() {
            warn!(request_id = id, admin_id = admin.id, "KYC verified without any evidence attached");
        }

        if !requests::update_kyc(&mut *tx, &request, previous_kyc).await? {
            tx.rollback().await?;
            return self.lost_race(id).await;
        }

        let action = if verified {
            AuditAction::KycVerified
        } else {
            AuditAction::KycRejected
        };
        let entry = audit::record(&mut *tx, id, action, Some(admin.id), notes, now).await?;
        let owner = load_owner(&mut tx, &request).await?;
        tx.commit().await?;

        info!(
            request_id = id,
            admin_id = admin.id,
            action = %action,
            "KYC {}",
            request.kyc_status
        );
        self.dispatcher.dispatch(Notice {
            account: owner,
            request: request.clone(),
            entry,
        });
        Ok(Outcome::Applied(request))
    }

    /// Approve or reject a pending request
    ///
    /// Approval requires verified KYC and grants the requested capability to the owner.
    pub async fn process_role_request(
        &self,
        admin: &Account,
        id: RequestId,
        decision: RoleDecision,
        notes: &str,
    ) -> Result<Outcome> {
        authorize(admin, Permission::ProcessRoleRequests)?;

        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;
        let mut request = requests::load_request(&mut *tx, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        let now = time::now();

        let transition = match decision {
            RoleDecision::Approve => match request.approve(admin.id, now) {
                Ok(transition) => transition,
                Err(e) => {
                    tx.rollback().await?;
                    info!(
                        request_id = id,
                        kyc_status = %request.kyc_status,
                        "Approval refused: {}",
                        e
                    );
                    return Err(e);
                }
            },
            RoleDecision::Reject => request.reject(admin.id, notes, now),
        };
        if transition == Transition::Unchanged {
            tx.rollback().await?;
            info!(request_id = id, status = %request.status, "Role request already processed");
            return Ok(Outcome::Unchanged(request));
        }

        if decision == RoleDecision::Approve && !notes.trim().is_empty() {
            request.admin_notes = Some(notes.trim().to_string());
        }

        if !requests::update_status(&mut *tx, &request, RequestStatus::Pending).await? {
            tx.rollback().await?;
            return self.lost_race(id).await;
        }

        let mut owner = load_owner(&mut tx, &request).await?;
        let action = match decision {
            RoleDecision::Approve => {
                let capability = request.request_type.capability();
                if owner.grant(capability, now) {
                    accounts::save_capabilities(&mut *tx, &owner).await?;
                    info!(
                        account_id = owner.id,
                        capability = %capability,
                        role = %owner.role(),
                        "Capability granted"
                    );
                }
                AuditAction::RoleApproved
            }
            RoleDecision::Reject => AuditAction::RoleRejected,
        };
        let entry = audit::record(&mut *tx, id, action, Some(admin.id), notes, now).await?;
        tx.commit().await?;

        info!(
            request_id = id,
            admin_id = admin.id,
            action = %action,
            "Role request {}",
            request.status
        );
        self.dispatcher.dispatch(Notice {
            account: owner,
            request: request.clone(),
            entry,
        });
        Ok(Outcome::Applied(request))
    }

    /// Every request, newest first (admin only)
    pub async fn list_requests(
        &self,
        viewer: &Account,
        status: Option<RequestStatus>,
    ) -> Result<Vec<UpgradeRequest>> {
        authorize(viewer, Permission::ViewAllRoleRequests)?;
        Ok(requests::list_requests(&self.db, status).await?)
    }

    /// One request with its owner and audit trail (admin only)
    pub async fn request_detail(&self, viewer: &Account, id: RequestId) -> Result<RequestDetail> {
        authorize(viewer, Permission::ViewAllRoleRequests)?;

        let request = requests::load_request(&self.db, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        let owner = accounts::load_account(&self.db, request.account_id).await?;
        let audit_log = audit::list_for_request(&self.db, id).await?;

        Ok(RequestDetail {
            request,
            owner,
            audit_log,
        })
    }

    /// The caller's own requests, newest first
    pub async fn my_requests(&self, owner: &Account) -> Result<Vec<UpgradeRequest>> {
        Ok(requests::list_for_account(&self.db, owner.id).await?)
    }

    async fn lost_race(&self, id: RequestId) -> Result<Outcome> {
        let current = requests::load_request(&self.db, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        warn!(
            request_id = id,
            status = %current.status,
            kyc_status = %current.kyc_status,
            "Concurrent update won; leaving request unchanged"
        );
        Ok(Outcome::Unchanged(current))
    }
}

fn duplicate_pending(request_type: RequestType) -> WorkflowError {
    WorkflowError::Conflict(format!(
        "You already have a pending {} request",
        request_type.label()
    ))
}

async fn load_owner(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    request: &UpgradeRequest,
) -> Result<Account> {
    accounts::load_account(&mut **tx, request.account_id)
        .await?
        .ok_or_else(|| {
            WorkflowError::Common(stagepass_common::Error::Internal(format!(
                "Owner account {} of request {} is missing",
                request.account_id, request.id
            )))
        })
}
