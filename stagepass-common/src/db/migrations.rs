//! Database schema migrations
//!
//! Versioned, idempotent migrations tracked in the `schema_version` table.
//! Tables themselves are created with `CREATE TABLE IF NOT EXISTS` beforehand, so a
//! migration only carries changes that cannot be expressed that way: indexes over
//! existing data and data fixes.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - databases in the field already applied them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Check before changing** - every migration must be safe to run twice

use crate::time::{self, to_db_timestamp};
use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Marker written to requests superseded by migration v1
pub const SUPERSEDED_NOTE: &str = "Superseded by a newer pending request.";

/// Pending requests with a newer pending request of the same type for the same account
const SUPERSEDED_PREDICATE: &str = r#"
    status = 'pending'
    AND EXISTS (
        SELECT 1 FROM role_upgrade_requests newer
        WHERE newer.account_id = role_upgrade_requests.account_id
          AND newer.request_type = role_upgrade_requests.request_type
          AND newer.status = 'pending'
          AND newer.id > role_upgrade_requests.id
    )
"#;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        warn!("This may indicate a downgrade. Proceeding with caution.");
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    info!("All migrations completed successfully");
    Ok(())
}

/// Migration v1: at most one pending request per (account, request_type)
///
/// Older databases may already hold duplicates. All but the newest pending request of
/// each pair are closed as rejected before the partial unique index is created. Each
/// closure gets a `role_rejected` audit row with no admin.
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: unique pending request per account and type");

    let stamp = to_db_timestamp(&time::now());
    let mut tx = pool.begin().await?;

    // Audit first: the predicate only matches while the rows are still pending
    sqlx::query(&format!(
        r#"
        INSERT INTO kyc_audit_logs (request_id, action, admin_id, notes, created_at)
        SELECT id, 'role_rejected', NULL, ?, ?
        FROM role_upgrade_requests
        WHERE {}
        "#,
        SUPERSEDED_PREDICATE
    ))
    .bind(SUPERSEDED_NOTE)
    .bind(&stamp)
    .execute(&mut *tx)
    .await?;

    let superseded = sqlx::query(&format!(
        r#"
        UPDATE role_upgrade_requests
        SET status = 'rejected',
            admin_notes = TRIM(COALESCE(admin_notes, '') || ' ' || ?),
            updated_at = ?
        WHERE {}
        "#,
        SUPERSEDED_PREDICATE
    ))
    .bind(SUPERSEDED_NOTE)
    .bind(&stamp)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if superseded > 0 {
        warn!("  Closed {} duplicate pending request(s)", superseded);
    }

    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_role_requests_one_pending
        ON role_upgrade_requests(account_id, request_type)
        WHERE status = 'pending'
        "#,
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    info!("  ✓ Created idx_role_requests_one_pending");
    Ok(())
}

/// Migration v2: rebuild the cached `role` label from capability flags
///
/// Capability flags are authoritative; rows written by older code may disagree.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: recompute cached account roles");

    let updated = sqlx::query(
        r#"
        UPDATE accounts
        SET role = CASE
            WHEN is_superuser <> 0 THEN 'admin'
            WHEN is_artist <> 0 THEN 'artist'
            WHEN is_host <> 0 THEN 'host'
            ELSE 'ordinary_user'
        END
        WHERE role <> CASE
            WHEN is_superuser <> 0 THEN 'admin'
            WHEN is_artist <> 0 THEN 'artist'
            WHEN is_host <> 0 THEN 'host'
            ELSE 'ordinary_user'
        END
        "#,
    )
    .execute(pool)
    .await?
    .rows_affected();

    info!("  ✓ Recomputed role for {} account(s)", updated);
    Ok(())
}
