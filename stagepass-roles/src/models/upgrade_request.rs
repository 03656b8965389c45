//! Role upgrade request and its embedded KYC record
//!
//! Transitions here only mutate the in-memory value. Persistence (compare-and-set),
//! audit entries and notifications belong to [`crate::workflow`].
//!
//! Overall status: `pending` → `approved` | `rejected` | `canceled` (all terminal).
//! KYC status moves independently between `pending`, `verified` and `rejected` while
//! the request is pending. `approved` requires `kyc_status == verified`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::account::{AccountId, Capability};
use crate::error::{Result, WorkflowError};

pub type RequestId = i64;

/// Appended to `admin_notes` when the owner cancels
pub const CANCELED_MARKER: &str = "Canceled by user.";

pub const KYC_NOT_VERIFIED_MESSAGE: &str = "KYC must be verified before approving this request";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    ToArtist,
    ToHost,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::ToArtist => "to_artist",
            RequestType::ToHost => "to_host",
        }
    }

    /// Capability granted on approval
    pub fn capability(&self) -> Capability {
        match self {
            RequestType::ToArtist => Capability::Artist,
            RequestType::ToHost => Capability::Host,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RequestType::ToArtist => "Upgrade to Artist",
            RequestType::ToHost => "Upgrade to Host",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestType {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "to_artist" => Ok(RequestType::ToArtist),
            "to_host" => Ok(RequestType::ToHost),
            other => Err(WorkflowError::Validation(format!(
                "Invalid request type '{}': expected to_artist or to_host",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Canceled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "rejected" => Ok(RequestStatus::Rejected),
            "canceled" => Ok(RequestStatus::Canceled),
            other => Err(WorkflowError::Validation(format!(
                "Invalid request status '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::Verified => "verified",
            KycStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for KycStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KycStatus {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "pending" => Ok(KycStatus::Pending),
            "verified" => Ok(KycStatus::Verified),
            "rejected" => Ok(KycStatus::Rejected),
            other => Err(WorkflowError::Validation(format!(
                "Invalid KYC status '{}'",
                other
            ))),
        }
    }
}

/// Identity evidence supplied with a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KycEvidence {
    pub id_type: Option<String>,
    pub id_number: Option<String>,
    /// Stored document reference (relative path under the root folder)
    pub document: Option<String>,
}

impl KycEvidence {
    /// Drops blank fields
    pub fn normalized(self) -> Self {
        fn clean(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }
        Self {
            id_type: clean(self.id_type),
            id_number: clean(self.id_number),
            document: clean(self.document),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id_type.is_none() && self.id_number.is_none() && self.document.is_none()
    }
}

/// Validated input for a new request
#[derive(Debug, Clone)]
pub struct NewUpgradeRequest {
    pub account_id: AccountId,
    pub request_type: RequestType,
    pub reason: String,
    pub evidence: KycEvidence,
}

impl NewUpgradeRequest {
    pub fn new(
        account_id: AccountId,
        request_type: &str,
        reason: &str,
        evidence: KycEvidence,
    ) -> Result<Self> {
        let request_type: RequestType = request_type.parse()?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(WorkflowError::Validation(
                "A reason for the request is required".to_string(),
            ));
        }

        Ok(Self {
            account_id,
            request_type,
            reason: reason.to_string(),
            evidence: evidence.normalized(),
        })
    }
}

/// Result of applying a transition to the in-memory value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    /// Request already terminal or already in the target state; nothing changed
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeRequest {
    pub id: RequestId,
    pub account_id: AccountId,
    pub request_type: RequestType,
    pub status: RequestStatus,
    pub reason: String,
    pub kyc_id_type: Option<String>,
    pub kyc_id_number: Option<String>,
    pub kyc_document: Option<String>,
    pub kyc_status: KycStatus,
    pub kyc_submitted_at: Option<DateTime<Utc>>,
    pub kyc_verified_at: Option<DateTime<Utc>>,
    pub kyc_reject_reason: Option<String>,
    pub admin_notes: Option<String>,
    pub processed_by: Option<AccountId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UpgradeRequest {
    /// Fresh pending request as persisted under `id`
    pub fn from_new(id: RequestId, new: NewUpgradeRequest, now: DateTime<Utc>) -> Self {
        let kyc_submitted_at = if new.evidence.is_empty() {
            None
        } else {
            Some(now)
        };

        Self {
            id,
            account_id: new.account_id,
            request_type: new.request_type,
            status: RequestStatus::Pending,
            reason: new.reason,
            kyc_id_type: new.evidence.id_type,
            kyc_id_number: new.evidence.id_number,
            kyc_document: new.evidence.document,
            kyc_status: KycStatus::Pending,
            kyc_submitted_at,
            kyc_verified_at: None,
            kyc_reject_reason: None,
            admin_notes: None,
            processed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_kyc_evidence(&self) -> bool {
        self.kyc_id_type.is_some() || self.kyc_id_number.is_some() || self.kyc_document.is_some()
    }

    /// Move the KYC sub-record to verified or rejected
    ///
    /// Verify stamps `kyc_verified_at` and replaces `admin_notes` only with non-empty
    /// notes. Reject stores the notes as `kyc_reject_reason` and clears any earlier
    /// verification stamp. Overall `status` is never touched.
    pub fn verify_kyc(
        &mut self,
        admin: AccountId,
        verified: bool,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Transition {
        let target = if verified {
            KycStatus::Verified
        } else {
            KycStatus::Rejected
        };
        if self.status.is_terminal() || self.kyc_status == target {
            return Transition::Unchanged;
        }

        let notes = notes.trim();
        self.kyc_status = target;
        if verified {
            self.kyc_verified_at = Some(now);
            if !notes.is_empty() {
                self.admin_notes = Some(notes.to_string());
            }
        } else {
            self.kyc_verified_at = None;
            self.kyc_reject_reason = Some(notes.to_string());
        }
        self.processed_by = Some(admin);
        self.updated_at = now;
        Transition::Applied
    }

    /// Approve a pending request whose KYC is verified
    ///
    /// Fails with `PreconditionFailed` (and leaves the value untouched) when KYC is not
    /// verified. Granting the capability is the caller's job.
    pub fn approve(&mut self, admin: AccountId, now: DateTime<Utc>) -> Result<Transition> {
        if self.status.is_terminal() {
            return Ok(Transition::Unchanged);
        }
        if self.kyc_status != KycStatus::Verified {
            return Err(WorkflowError::PreconditionFailed(
                KYC_NOT_VERIFIED_MESSAGE.to_string(),
            ));
        }

        self.status = RequestStatus::Approved;
        self.processed_by = Some(admin);
        self.updated_at = now;
        Ok(Transition::Applied)
    }

    /// Reject a pending request; no KYC precondition
    pub fn reject(&mut self, admin: AccountId, notes: &str, now: DateTime<Utc>) -> Transition {
        if self.status.is_terminal() {
            return Transition::Unchanged;
        }

        let notes = notes.trim();
        self.status = RequestStatus::Rejected;
        self.processed_by = Some(admin);
        self.admin_notes = if notes.is_empty() {
            None
        } else {
            Some(notes.to_string())
        };
        self.updated_at = now;
        Transition::Applied
    }

    /// Withdraw a pending request on behalf of its owner
    pub fn cancel(&mut self, requester: AccountId, now: DateTime<Utc>) -> Result<()> {
        if requester != self.account_id {
            return Err(WorkflowError::Forbidden(
                "Only the owner can cancel this request".to_string(),
            ));
        }
        if self.status != RequestStatus::Pending {
            return Err(WorkflowError::Forbidden(
                "Only pending requests can be canceled".to_string(),
            ));
        }

        self.status = RequestStatus::Canceled;
        self.admin_notes = Some(match self.admin_notes.as_deref() {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{}\n{}", existing.trim_end(), CANCELED_MARKER)
            }
            _ => CANCELED_MARKER.to_string(),
        });
        self.processed_by = Some(requester);
        self.updated_at = now;
        Ok(())
    }
}
