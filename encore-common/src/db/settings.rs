//! Settings database access
//!
//! Read/write runtime-tunable values from the settings table (key-value
//! store). All settings are venue-independent daemon tuning; defaults are
//! ensured at startup by `init_default_settings`. Loaders clamp stored
//! values to sane ranges so a hand-edited row cannot spin a timer loop hot
//! or stretch a device timeout past usefulness.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Load the QueueSync polling backstop interval in milliseconds
///
/// Default 5000ms; clamped to 1000-60000ms. This bounds worst-case view
/// staleness when every push signal is lost.
pub async fn load_sync_poll_interval(db: &Pool<Sqlite>) -> Result<u64> {
    match get_setting::<u64>(db, "sync_poll_interval_ms").await? {
        Some(interval) => Ok(interval.clamp(1000, 60000)),
        None => Ok(5000),
    }
}

/// Load the auto-advance controller tick interval in milliseconds
///
/// Default 2000ms; clamped to 500-30000ms. Kept at or under the finish
/// guard band so at least one tick lands inside it.
pub async fn load_advance_interval(db: &Pool<Sqlite>) -> Result<u64> {
    match get_setting::<u64>(db, "advance_interval_ms").await? {
        Some(interval) => Ok(interval.clamp(500, 30000)),
        None => Ok(2000),
    }
}

/// Load the playback-device request timeout in milliseconds
///
/// Default 3000ms; clamped to 500-30000ms. A hung device costs the
/// controller at most one tick.
pub async fn load_device_timeout(db: &Pool<Sqlite>) -> Result<u64> {
    match get_setting::<u64>(db, "device_timeout_ms").await? {
        Some(timeout) => Ok(timeout.clamp(500, 30000)),
        None => Ok(3000),
    }
}

/// Load the settle delay between device search and load commands in
/// milliseconds
///
/// Default 500ms; clamped to 0-5000ms. The device protocol has no "search
/// complete" event, so the load command waits this long for results to
/// populate.
pub async fn load_device_settle_delay(db: &Pool<Sqlite>) -> Result<u64> {
    match get_setting::<u64>(db, "device_settle_delay_ms").await? {
        Some(delay) => Ok(delay.clamp(0, 5000)),
        None => Ok(500),
    }
}

/// Load the per-line advance interval for unsynced lyrics in milliseconds
///
/// Default 4000ms; clamped to 1000-30000ms.
pub async fn load_unsynced_line_interval(db: &Pool<Sqlite>) -> Result<u64> {
    match get_setting::<u64>(db, "unsynced_line_interval_ms").await? {
        Some(interval) => Ok(interval.clamp(1000, 30000)),
        None => Ok(4000),
    }
}

/// Generic setting getter
///
/// Returns None if key doesn't exist in database.
/// Parses value from string using FromStr trait.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}
