//! Domain models

pub mod account;
pub mod audit;
pub mod upgrade_request;

pub use account::{Account, AccountId, Capability, Role};
pub use audit::{AuditAction, KycAuditEntry};
pub use upgrade_request::{
    KycEvidence, KycStatus, NewUpgradeRequest, RequestId, RequestStatus, RequestType, Transition,
    UpgradeRequest, CANCELED_MARKER, KYC_NOT_VERIFIED_MESSAGE,
};
