//! Role upgrade request persistence
//!
//! Status and KYC updates are compare-and-set: they only apply when the row still holds
//! the state the caller read. A `false` return means another writer got there first.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use stagepass_common::time::{parse_db_timestamp, to_db_timestamp};
use stagepass_common::{Error, Result};

use crate::models::{
    AccountId, KycStatus, NewUpgradeRequest, RequestId, RequestStatus, RequestType,
    UpgradeRequest,
};

const REQUEST_COLUMNS: &str = r#"
    id, account_id, request_type, status, reason,
    kyc_id_type, kyc_id_number, kyc_document, kyc_status,
    kyc_submitted_at, kyc_verified_at, kyc_reject_reason,
    admin_notes, processed_by, created_at, updated_at
"#;

fn parse_column<T: std::str::FromStr>(row: &SqliteRow, column: &'static str) -> Result<T> {
    let value: String = row.try_get(column)?;
    value
        .parse()
        .map_err(|_| Error::UnexpectedValue { column, value })
}

fn optional_timestamp(row: &SqliteRow, column: &str) -> Result<Option<DateTime<Utc>>> {
    let value: Option<String> = row.try_get(column)?;
    value.as_deref().map(parse_db_timestamp).transpose()
}

fn request_from_row(row: &SqliteRow) -> Result<UpgradeRequest> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(UpgradeRequest {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        request_type: parse_column::<RequestType>(row, "request_type")?,
        status: parse_column::<RequestStatus>(row, "status")?,
        reason: row.try_get("reason")?,
        kyc_id_type: row.try_get("kyc_id_type")?,
        kyc_id_number: row.try_get("kyc_id_number")?,
        kyc_document: row.try_get("kyc_document")?,
        kyc_status: parse_column::<KycStatus>(row, "kyc_status")?,
        kyc_submitted_at: optional_timestamp(row, "kyc_submitted_at")?,
        kyc_verified_at: optional_timestamp(row, "kyc_verified_at")?,
        kyc_reject_reason: row.try_get("kyc_reject_reason")?,
        admin_notes: row.try_get("admin_notes")?,
        processed_by: row.try_get("processed_by")?,
        created_at: parse_db_timestamp(&created_at)?,
        updated_at: parse_db_timestamp(&updated_at)?,
    })
}

/// Insert a new pending request
///
/// A second pending request for the same (account, type) violates
/// `idx_role_requests_one_pending` and surfaces as a database unique violation.
pub async fn insert_request<'e>(
    executor: impl SqliteExecutor<'e>,
    new: NewUpgradeRequest,
    now: DateTime<Utc>,
) -> Result<UpgradeRequest> {
    let stamp = to_db_timestamp(&now);
    // Keep the returned value identical to what a later load reads back
    let now = parse_db_timestamp(&stamp)?;
    let submitted_at = if new.evidence.is_empty() {
        None
    } else {
        Some(stamp.clone())
    };

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO role_upgrade_requests (
            account_id, request_type, status, reason,
            kyc_id_type, kyc_id_number, kyc_document, kyc_status, kyc_submitted_at,
            created_at, updated_at
        ) VALUES (?, ?, 'pending', ?, ?, ?, ?, 'pending', ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(new.account_id)
    .bind(new.request_type.as_str())
    .bind(&new.reason)
    .bind(&new.evidence.id_type)
    .bind(&new.evidence.id_number)
    .bind(&new.evidence.document)
    .bind(&submitted_at)
    .bind(&stamp)
    .bind(&stamp)
    .fetch_one(executor)
    .await?;

    Ok(UpgradeRequest::from_new(id, new, now))
}

pub async fn load_request<'e>(
    executor: impl SqliteExecutor<'e>,
    id: RequestId,
) -> Result<Option<UpgradeRequest>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM role_upgrade_requests WHERE id = ?",
        REQUEST_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(request_from_row).transpose()
}

pub async fn has_pending_request<'e>(
    executor: impl SqliteExecutor<'e>,
    account_id: AccountId,
    request_type: RequestType,
) -> Result<bool> {
    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM role_upgrade_requests
            WHERE account_id = ? AND request_type = ? AND status = 'pending'
        )
        "#,
    )
    .bind(account_id)
    .bind(request_type.as_str())
    .fetch_one(executor)
    .await?;

    Ok(exists)
}

/// All requests, newest first, optionally filtered by status
pub async fn list_requests<'e>(
    executor: impl SqliteExecutor<'e>,
    status: Option<RequestStatus>,
) -> Result<Vec<UpgradeRequest>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM role_upgrade_requests
        WHERE (?1 IS NULL OR status = ?1)
        ORDER BY created_at DESC, id DESC
        "#,
        REQUEST_COLUMNS
    ))
    .bind(status.map(|s| s.as_str()))
    .fetch_all(executor)
    .await?;

    rows.iter().map(request_from_row).collect()
}

/// One account's requests, newest first
pub async fn list_for_account<'e>(
    executor: impl SqliteExecutor<'e>,
    account_id: AccountId,
) -> Result<Vec<UpgradeRequest>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM role_upgrade_requests
        WHERE account_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
        REQUEST_COLUMNS
    ))
    .bind(account_id)
    .fetch_all(executor)
    .await?;

    rows.iter().map(request_from_row).collect()
}

/// Persist an overall status transition if the row still holds `expected`
pub async fn update_status<'e>(
    executor: impl SqliteExecutor<'e>,
    request: &UpgradeRequest,
    expected: RequestStatus,
) -> Result<bool> {
    let updated = sqlx::query(
        r#"
        UPDATE role_upgrade_requests
        SET status = ?, admin_notes = ?, processed_by = ?, updated_at = ?
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(request.status.as_str())
    .bind(&request.admin_notes)
    .bind(request.processed_by)
    .bind(to_db_timestamp(&request.updated_at))
    .bind(request.id)
    .bind(expected.as_str())
    .execute(executor)
    .await?
    .rows_affected();

    Ok(updated == 1)
}

/// Persist a KYC transition if the request is still pending with `expected` KYC state
pub async fn update_kyc<'e>(
    executor: impl SqliteExecutor<'e>,
    request: &UpgradeRequest,
    expected: KycStatus,
) -> Result<bool> {
    let updated = sqlx::query(
        r#"
        UPDATE role_upgrade_requests
        SET kyc_status = ?, kyc_verified_at = ?, kyc_reject_reason = ?,
            admin_notes = ?, processed_by = ?, updated_at = ?
        WHERE id = ? AND status = 'pending' AND kyc_status = ?
        "#,
    )
    .bind(request.kyc_status.as_str())
    .bind(request.kyc_verified_at.as_ref().map(to_db_timestamp))
    .bind(&request.kyc_reject_reason)
    .bind(&request.admin_notes)
    .bind(request.processed_by)
    .bind(to_db_timestamp(&request.updated_at))
    .bind(request.id)
    .bind(expected.as_str())
    .execute(executor)
    .await?
    .rows_affected();

    Ok(updated == 1)
}
