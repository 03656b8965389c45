//! Account persistence
//!
//! Only the fields the role workflow needs. The `role` column is always written from
//! [`Account::role`] and never read back.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use stagepass_common::time::{parse_db_timestamp, to_db_timestamp};
use stagepass_common::Result;

use crate::models::{Account, AccountId};

const ACCOUNT_COLUMNS: &str =
    "id, email, display_name, is_artist, is_host, is_superuser, created_at, updated_at";

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        is_artist: row.try_get("is_artist")?,
        is_host: row.try_get("is_host")?,
        is_superuser: row.try_get("is_superuser")?,
        created_at: parse_db_timestamp(&created_at)?,
        updated_at: parse_db_timestamp(&updated_at)?,
    })
}

/// Insert a new account with an optional API token hash
pub async fn create_account<'e>(
    executor: impl SqliteExecutor<'e>,
    email: &str,
    display_name: &str,
    is_superuser: bool,
    api_token_hash: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Account> {
    let stamp = to_db_timestamp(&now);
    let now = parse_db_timestamp(&stamp)?;
    let role = if is_superuser { "admin" } else { "ordinary_user" };

    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO accounts (
            email, display_name, is_artist, is_host, is_superuser, role,
            api_token_hash, created_at, updated_at
        ) VALUES (?, ?, 0, 0, ?, ?, ?, ?, ?)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(display_name)
    .bind(is_superuser)
    .bind(role)
    .bind(api_token_hash)
    .bind(&stamp)
    .bind(&stamp)
    .fetch_one(executor)
    .await?;

    Ok(Account {
        id,
        email: email.to_string(),
        display_name: display_name.to_string(),
        is_artist: false,
        is_host: false,
        is_superuser,
        created_at: now,
        updated_at: now,
    })
}

pub async fn load_account<'e>(
    executor: impl SqliteExecutor<'e>,
    id: AccountId,
) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE id = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(account_from_row).transpose()
}

/// Resolve an API token hash to its account
pub async fn find_by_token_hash<'e>(
    executor: impl SqliteExecutor<'e>,
    token_hash: &str,
) -> Result<Option<Account>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM accounts WHERE api_token_hash = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(token_hash)
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(account_from_row).transpose()
}

/// Persist capability flags and refresh the cached role label
pub async fn save_capabilities<'e>(
    executor: impl SqliteExecutor<'e>,
    account: &Account,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE accounts
        SET is_artist = ?, is_host = ?, role = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(account.is_artist)
    .bind(account.is_host)
    .bind(account.role().as_str())
    .bind(to_db_timestamp(&account.updated_at))
    .bind(account.id)
    .execute(executor)
    .await?;

    Ok(())
}
