//! Centralized authorization
//!
//! Superusers hold [`Privilege::Elevated`], which satisfies every [`Permission`].
//! Everything else is decided from the capability flags. Handlers, the workflow
//! controller and account capability queries all go through [`is_permitted`].

use serde::Serialize;
use std::fmt;

use crate::error::{Result, WorkflowError};
use crate::models::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    Standard,
    Elevated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Verify KYC and approve/reject role requests
    ProcessRoleRequests,
    /// List and inspect every account's requests
    ViewAllRoleRequests,
    CreateEvents,
    UploadReels,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Permission::ProcessRoleRequests => "process role requests",
            Permission::ViewAllRoleRequests => "view all role requests",
            Permission::CreateEvents => "create events",
            Permission::UploadReels => "upload reels",
        };
        f.write_str(name)
    }
}

pub fn is_permitted(account: &Account, permission: Permission) -> bool {
    match account.privilege() {
        Privilege::Elevated => true,
        Privilege::Standard => match permission {
            Permission::ProcessRoleRequests | Permission::ViewAllRoleRequests => false,
            Permission::CreateEvents => account.is_host,
            Permission::UploadReels => account.is_artist,
        },
    }
}

/// Fail with `Forbidden` unless `account` holds `permission`
pub fn authorize(account: &Account, permission: Permission) -> Result<()> {
    if is_permitted(account, permission) {
        Ok(())
    } else {
        tracing::debug!(account_id = account.id, %permission, "Permission denied");
        Err(WorkflowError::Forbidden(format!(
            "You do not have permission to {}",
            permission
        )))
    }
}
