//! Database initialization
//!
//! Opens (or creates) the SQLite database with foreign keys and WAL enabled, creates
//! every table idempotently, runs versioned migrations and fills default settings.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use super::migrations::run_migrations;
use super::settings::{ensure_setting, get_setting, BUSY_TIMEOUT_KEY, DOCUMENT_MAX_BYTES_KEY};

/// Busy timeout used until the settings table has been read
const DEFAULT_BUSY_TIMEOUT_MS: i64 = 5000;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let pool = connect_file(db_path, DEFAULT_BUSY_TIMEOUT_MS).await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    prepare_schema(&pool).await?;

    // Pragmas are per connection, so a configured busy timeout means reconnecting
    let timeout_ms: i64 = get_setting(&pool, BUSY_TIMEOUT_KEY)
        .await?
        .and_then(|v| v.parse().ok())
        .filter(|ms| *ms >= 0)
        .unwrap_or(DEFAULT_BUSY_TIMEOUT_MS);

    if timeout_ms == DEFAULT_BUSY_TIMEOUT_MS {
        info!("Database busy timeout set to {} ms", timeout_ms);
        return Ok(pool);
    }

    pool.close().await;
    let pool = connect_file(db_path, timeout_ms).await?;
    info!("Database busy timeout set to {} ms", timeout_ms);

    Ok(pool)
}

/// Pool over a database file; WAL allows concurrent readers with one writer
async fn connect_file(db_path: &Path, busy_timeout_ms: i64) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(busy_timeout_ms as u64));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Fresh private in-memory database with the full schema
///
/// Single connection that never expires: an in-memory SQLite database lives
/// exactly as long as its connection.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS as u64));
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    prepare_schema(&pool).await?;
    Ok(pool)
}

/// Tables, migrations and default settings (idempotent)
async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_settings_table(pool).await?;
    create_accounts_table(pool).await?;
    create_role_upgrade_requests_table(pool).await?;
    create_kyc_audit_logs_table(pool).await?;

    run_migrations(pool).await?;

    init_default_settings(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime configuration key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Accounts referenced by role requests
///
/// `role` is a cache written from the capability flags; the flags are authoritative.
async fn create_accounts_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL DEFAULT '',
            is_artist INTEGER NOT NULL DEFAULT 0,
            is_host INTEGER NOT NULL DEFAULT 0,
            is_superuser INTEGER NOT NULL DEFAULT 0,
            role TEXT NOT NULL DEFAULT 'ordinary_user'
                CHECK (role IN ('ordinary_user', 'artist', 'host', 'admin')),
            api_token_hash TEXT UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_role_upgrade_requests_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS role_upgrade_requests (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
            request_type TEXT NOT NULL CHECK (request_type IN ('to_artist', 'to_host')),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected', 'canceled')),
            reason TEXT NOT NULL,
            kyc_id_type TEXT,
            kyc_id_number TEXT,
            kyc_document TEXT,
            kyc_status TEXT NOT NULL DEFAULT 'pending'
                CHECK (kyc_status IN ('pending', 'verified', 'rejected')),
            kyc_submitted_at TEXT,
            kyc_verified_at TEXT,
            kyc_reject_reason TEXT,
            admin_notes TEXT,
            processed_by INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (status <> 'approved' OR kyc_status = 'verified')
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_role_requests_account ON role_upgrade_requests(account_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_role_requests_status ON role_upgrade_requests(status, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Append-only audit trail; rows may disappear only through the parent cascade
async fn create_kyc_audit_logs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS kyc_audit_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            request_id INTEGER NOT NULL
                REFERENCES role_upgrade_requests(id) ON DELETE CASCADE,
            action TEXT NOT NULL CHECK (action IN (
                'kyc_verified', 'kyc_rejected', 'role_approved', 'role_rejected', 'request_canceled'
            )),
            admin_id INTEGER REFERENCES accounts(id) ON DELETE SET NULL,
            notes TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_kyc_audit_logs_request ON kyc_audit_logs(request_id, created_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS kyc_audit_logs_append_only
        BEFORE UPDATE ON kyc_audit_logs
        BEGIN
            SELECT RAISE(ABORT, 'kyc_audit_logs is append-only');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize default settings
///
/// `kyc_webhook_url` is deliberately absent: a missing row means "use the TOML value",
/// while an empty row means "webhook disabled".
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, BUSY_TIMEOUT_KEY, &DEFAULT_BUSY_TIMEOUT_MS.to_string()).await?;
    ensure_setting(pool, DOCUMENT_MAX_BYTES_KEY, "10485760").await?; // 10 MiB

    Ok(())
}
