//! Venue playback-device registry
//!
//! One row per venue. The daemon reads enabled rows at startup to decide
//! which venues get an auto-advance controller.

use encore_common::db::DeviceConfig;
use encore_common::Result;
use sqlx::SqlitePool;

type DeviceRow = (String, String, i64, Option<String>, i64);

fn device_from_row(row: DeviceRow) -> DeviceConfig {
    DeviceConfig {
        venue_id: row.0,
        host: row.1,
        port: row.2 as u16,
        credential: row.3,
        enabled: row.4 != 0,
    }
}

/// All venues with an enabled playback device
pub async fn list_enabled(db: &SqlitePool) -> Result<Vec<DeviceConfig>> {
    let rows = sqlx::query_as::<_, DeviceRow>(
        r#"
        SELECT venue_id, host, port, credential, enabled
        FROM venue_devices
        WHERE enabled = 1
        ORDER BY venue_id
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(device_from_row).collect())
}

/// The device registered for a venue, enabled or not
pub async fn get_device(db: &SqlitePool, venue_id: &str) -> Result<Option<DeviceConfig>> {
    let row = sqlx::query_as::<_, DeviceRow>(
        r#"
        SELECT venue_id, host, port, credential, enabled
        FROM venue_devices
        WHERE venue_id = ?
        "#,
    )
    .bind(venue_id)
    .fetch_optional(db)
    .await?;

    Ok(row.map(device_from_row))
}

/// Register or replace a venue's device
pub async fn upsert_device(db: &SqlitePool, device: &DeviceConfig) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO venue_devices (venue_id, host, port, credential, enabled)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(venue_id) DO UPDATE SET
            host = excluded.host,
            port = excluded.port,
            credential = excluded.credential,
            enabled = excluded.enabled,
            updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(&device.venue_id)
    .bind(&device.host)
    .bind(device.port as i64)
    .bind(&device.credential)
    .bind(device.enabled as i64)
    .execute(db)
    .await?;

    Ok(())
}
