//! Settings table access
//!
//! Database-first runtime configuration. A NULL value is treated as missing.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// SQLite busy timeout applied at startup
pub const BUSY_TIMEOUT_KEY: &str = "db_busy_timeout_ms";

/// Webhook URL override for audited actions (empty = disabled)
pub const WEBHOOK_URL_KEY: &str = "kyc_webhook_url";

/// Largest accepted KYC document upload in bytes
pub const DOCUMENT_MAX_BYTES_KEY: &str = "kyc_document_max_bytes";

/// Read a setting value
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

    Ok(value.flatten())
}

/// Insert or replace a setting value
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Make sure `key` exists with a non-NULL value, writing `default_value` otherwise
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE tolerates concurrent initialization
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted > 0 {
        info!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let reset = sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
        .bind(default_value)
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();

    if reset > 0 {
        info!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
