//! KYC audit log persistence (append-only)

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use stagepass_common::time::{parse_db_timestamp, to_db_timestamp};
use stagepass_common::{Error, Result};

use crate::models::{AccountId, AuditAction, KycAuditEntry, RequestId};

fn entry_from_row(row: &SqliteRow) -> Result<KycAuditEntry> {
    let action: String = row.try_get("action")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(KycAuditEntry {
        id: row.try_get("id")?,
        request_id: row.try_get("request_id")?,
        action: action
            .parse()
            .map_err(|_| Error::UnexpectedValue {
                column: "action",
                value: action.clone(),
            })?,
        admin_id: row.try_get("admin_id")?,
        notes: row.try_get("notes")?,
        created_at: parse_db_timestamp(&created_at)?,
    })
}

/// Append one audit row
pub async fn record<'e>(
    executor: impl SqliteExecutor<'e>,
    request_id: RequestId,
    action: AuditAction,
    admin_id: Option<AccountId>,
    notes: &str,
    now: DateTime<Utc>,
) -> Result<KycAuditEntry> {
    let stamp = to_db_timestamp(&now);
    let created_at = parse_db_timestamp(&stamp)?;
    let notes = Some(notes.trim().to_string()).filter(|n| !n.is_empty());

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO kyc_audit_logs (request_id, action, admin_id, notes, created_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(request_id)
    .bind(action.as_str())
    .bind(admin_id)
    .bind(&notes)
    .bind(&stamp)
    .fetch_one(executor)
    .await?;

    Ok(KycAuditEntry {
        id,
        request_id,
        action,
        admin_id,
        notes,
        created_at,
    })
}

/// Entries for one request, most recent first
pub async fn list_for_request<'e>(
    executor: impl SqliteExecutor<'e>,
    request_id: RequestId,
) -> Result<Vec<KycAuditEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, request_id, action, admin_id, notes, created_at
        FROM kyc_audit_logs
        WHERE request_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(request_id)
    .fetch_all(executor)
    .await?;

    rows.iter().map(entry_from_row).collect()
}
