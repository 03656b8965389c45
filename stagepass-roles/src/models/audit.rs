//! KYC audit trail entries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::account::AccountId;
use super::upgrade_request::RequestId;
use crate::error::WorkflowError;

/// Action recorded against a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    KycVerified,
    KycRejected,
    RoleApproved,
    RoleRejected,
    RequestCanceled,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::KycVerified => "kyc_verified",
            AuditAction::KycRejected => "kyc_rejected",
            AuditAction::RoleApproved => "role_approved",
            AuditAction::RoleRejected => "role_rejected",
            AuditAction::RequestCanceled => "request_canceled",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kyc_verified" => Ok(AuditAction::KycVerified),
            "kyc_rejected" => Ok(AuditAction::KycRejected),
            "role_approved" => Ok(AuditAction::RoleApproved),
            "role_rejected" => Ok(AuditAction::RoleRejected),
            "request_canceled" => Ok(AuditAction::RequestCanceled),
            other => Err(WorkflowError::Validation(format!(
                "Unknown audit action '{}'",
                other
            ))),
        }
    }
}

/// One immutable audit row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycAuditEntry {
    pub id: i64,
    pub request_id: RequestId,
    pub action: AuditAction,
    /// Acting account; None when the system acted
    pub admin_id: Option<AccountId>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}
