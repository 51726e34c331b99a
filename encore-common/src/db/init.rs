//! Database initialization
//!
//! Creates the database on first run and brings the schema up idempotently.
//! The partial unique index on active positions is the structural backstop
//! for the one race that would corrupt the queue: two entries holding the
//! same position in a venue's active set.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Open (creating if needed) the database at `db_path` and prepare the schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL keeps readers (queue fetches, SSE-triggered refetches) off the
    // writer's lock during enqueue bursts
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_tables(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes (idempotent)
///
/// Public so tests can bring an in-memory database to the same schema the
/// daemon runs against.
pub async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_queue_entries_table(pool).await?;
    create_settings_table(pool).await?;
    create_venue_devices_table(pool).await?;
    Ok(())
}

async fn create_queue_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queue_entries (
            id TEXT PRIMARY KEY,
            venue_id TEXT NOT NULL,
            singer_id TEXT NOT NULL,
            song_title TEXT NOT NULL,
            artist TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'waiting'
                CHECK (status IN ('waiting', 'up_next', 'now_singing', 'completed', 'skipped')),
            position INTEGER NOT NULL,
            requested_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Position uniqueness applies to the active set only; terminal entries
    // keep historical positions that later entries may legitimately repeat.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_queue_entries_active_position
        ON queue_entries(venue_id, position)
        WHERE status IN ('waiting', 'up_next', 'now_singing')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_queue_entries_venue_status ON queue_entries(venue_id, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the settings table
///
/// Stores runtime-tunable configuration key-value pairs.
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

async fn create_venue_devices_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS venue_devices (
            venue_id TEXT PRIMARY KEY,
            host TEXT NOT NULL,
            port INTEGER NOT NULL CHECK (port > 0 AND port <= 65535),
            credential TEXT,
            enabled INTEGER NOT NULL DEFAULT 1,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Ensure all runtime settings exist with default values
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    ensure_setting(pool, "sync_poll_interval_ms", "5000").await?;
    ensure_setting(pool, "advance_interval_ms", "2000").await?;
    ensure_setting(pool, "device_timeout_ms", "3000").await?;
    ensure_setting(pool, "device_settle_delay_ms", "500").await?;
    ensure_setting(pool, "unsynced_line_interval_ms", "4000").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE handles concurrent initialization races
    sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?;

    // A NULL value is treated the same as a missing row
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_tables_idempotent() {
        let pool = setup_pool().await;
        create_tables(&pool).await.unwrap();
        create_tables(&pool).await.unwrap();

        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM queue_entries")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_default_settings_initialized() {
        let pool = setup_pool().await;
        create_tables(&pool).await.unwrap();
        init_default_settings(&pool).await.unwrap();

        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'sync_poll_interval_ms'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(value.as_deref(), Some("5000"));
    }

    #[tokio::test]
    async fn test_ensure_setting_preserves_existing_value() {
        let pool = setup_pool().await;
        create_tables(&pool).await.unwrap();

        sqlx::query("INSERT INTO settings (key, value) VALUES ('advance_interval_ms', '750')")
            .execute(&pool)
            .await
            .unwrap();
        init_default_settings(&pool).await.unwrap();

        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'advance_interval_ms'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(value.as_deref(), Some("750"));
    }

    #[tokio::test]
    async fn test_ensure_setting_resets_null_value() {
        let pool = setup_pool().await;
        create_tables(&pool).await.unwrap();

        sqlx::query("INSERT INTO settings (key, value) VALUES ('device_timeout_ms', NULL)")
            .execute(&pool)
            .await
            .unwrap();
        init_default_settings(&pool).await.unwrap();

        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM settings WHERE key = 'device_timeout_ms'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(value.as_deref(), Some("3000"));
    }

    #[tokio::test]
    async fn test_active_position_uniqueness_enforced() {
        let pool = setup_pool().await;
        create_tables(&pool).await.unwrap();

        sqlx::query(
            "INSERT INTO queue_entries (id, venue_id, singer_id, song_title, status, position, requested_at)
             VALUES ('a', 'v1', 's1', 'Song A', 'waiting', 1, '2026-01-01T00:00:00Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        // Same active position in the same venue must be rejected
        let dup = sqlx::query(
            "INSERT INTO queue_entries (id, venue_id, singer_id, song_title, status, position, requested_at)
             VALUES ('b', 'v1', 's2', 'Song B', 'waiting', 1, '2026-01-01T00:00:01Z')",
        )
        .execute(&pool)
        .await;
        assert!(dup.is_err());

        // Same position is fine in another venue
        sqlx::query(
            "INSERT INTO queue_entries (id, venue_id, singer_id, song_title, status, position, requested_at)
             VALUES ('c', 'v2', 's3', 'Song C', 'waiting', 1, '2026-01-01T00:00:02Z')",
        )
        .execute(&pool)
        .await
        .unwrap();

        // And fine when the holder is terminal
        sqlx::query("UPDATE queue_entries SET status = 'completed' WHERE id = 'a'")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO queue_entries (id, venue_id, singer_id, song_title, status, position, requested_at)
             VALUES ('d', 'v1', 's4', 'Song D', 'waiting', 1, '2026-01-01T00:00:03Z')",
        )
        .execute(&pool)
        .await
        .unwrap();
    }
}
