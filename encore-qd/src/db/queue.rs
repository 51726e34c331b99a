//! Queue entry storage
//!
//! Positions are assigned once, by a single INSERT..SELECT that reads the
//! active maximum and writes the new row in one statement. Terminal entries
//! keep their position but leave the active set, so positions are never
//! compacted and an empty active set restarts numbering at 1.

use chrono::{DateTime, Utc};
use encore_common::db::QueueEntry;
use encore_common::model::EntryStatus;
use encore_common::{Error, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Row shape shared by every entry query: id, venue_id, singer_id,
/// song_title, artist, status, position, requested_at, completed_at
type EntryRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
);

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Malformed timestamp '{}': {}", raw, e)))
}

fn entry_from_row(row: EntryRow) -> Result<QueueEntry> {
    let id = Uuid::parse_str(&row.0)
        .map_err(|e| Error::Internal(format!("Malformed entry id '{}': {}", row.0, e)))?;
    let status = row.5.parse::<EntryStatus>().map_err(Error::Internal)?;
    let completed_at = match row.8 {
        Some(raw) => Some(parse_timestamp(&raw)?),
        None => None,
    };

    Ok(QueueEntry {
        id,
        venue_id: row.1,
        singer_id: row.2,
        song_title: row.3,
        artist: row.4,
        status,
        position: row.6,
        requested_at: parse_timestamp(&row.7)?,
        completed_at,
    })
}

/// Insert a new waiting entry at the tail of the venue's active queue
///
/// Position assignment and insert happen in one statement, so concurrent
/// enqueues can never read the same maximum; the partial unique index backs
/// this up structurally.
pub async fn insert_entry(
    db: &SqlitePool,
    venue_id: &str,
    singer_id: &str,
    song_title: &str,
    artist: &str,
) -> Result<QueueEntry> {
    let id = Uuid::new_v4();
    let requested_at = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO queue_entries
            (id, venue_id, singer_id, song_title, artist, status, position, requested_at)
        SELECT ?, ?, ?, ?, ?, 'waiting', COALESCE(MAX(position), 0) + 1, ?
        FROM queue_entries
        WHERE venue_id = ? AND status IN ('waiting', 'up_next', 'now_singing')
        "#,
    )
    .bind(id.to_string())
    .bind(venue_id)
    .bind(singer_id)
    .bind(song_title)
    .bind(artist)
    .bind(requested_at.to_rfc3339())
    .bind(venue_id)
    .execute(db)
    .await?;

    get_entry(db, id).await
}

/// Fetch a single entry by id
pub async fn get_entry(db: &SqlitePool, entry_id: Uuid) -> Result<QueueEntry> {
    let row = sqlx::query_as::<_, EntryRow>(
        r#"
        SELECT id, venue_id, singer_id, song_title, artist, status, position,
               requested_at, completed_at
        FROM queue_entries
        WHERE id = ?
        "#,
    )
    .bind(entry_id.to_string())
    .fetch_optional(db)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Queue entry not found: {}", entry_id)))?;

    entry_from_row(row)
}

/// All active entries for a venue in serving order (position ascending)
pub async fn list_active(db: &SqlitePool, venue_id: &str) -> Result<Vec<QueueEntry>> {
    let rows = sqlx::query_as::<_, EntryRow>(
        r#"
        SELECT id, venue_id, singer_id, song_title, artist, status, position,
               requested_at, completed_at
        FROM queue_entries
        WHERE venue_id = ? AND status IN ('waiting', 'up_next', 'now_singing')
        ORDER BY position ASC
        "#,
    )
    .bind(venue_id)
    .fetch_all(db)
    .await?;

    rows.into_iter().map(entry_from_row).collect()
}

/// The singer's earliest active entry at a venue, if any
pub async fn active_for_singer(
    db: &SqlitePool,
    venue_id: &str,
    singer_id: &str,
) -> Result<Option<QueueEntry>> {
    let row = sqlx::query_as::<_, EntryRow>(
        r#"
        SELECT id, venue_id, singer_id, song_title, artist, status, position,
               requested_at, completed_at
        FROM queue_entries
        WHERE venue_id = ? AND singer_id = ?
          AND status IN ('waiting', 'up_next', 'now_singing')
        ORDER BY position ASC
        LIMIT 1
        "#,
    )
    .bind(venue_id)
    .bind(singer_id)
    .fetch_optional(db)
    .await?;

    row.map(entry_from_row).transpose()
}

/// The venue's performing entry, if one exists
pub async fn current_now_singing(db: &SqlitePool, venue_id: &str) -> Result<Option<QueueEntry>> {
    let row = sqlx::query_as::<_, EntryRow>(
        r#"
        SELECT id, venue_id, singer_id, song_title, artist, status, position,
               requested_at, completed_at
        FROM queue_entries
        WHERE venue_id = ? AND status = 'now_singing'
        LIMIT 1
        "#,
    )
    .bind(venue_id)
    .fetch_optional(db)
    .await?;

    row.map(entry_from_row).transpose()
}

/// Lowest-position active entry that is not already performing
pub async fn next_up(db: &SqlitePool, venue_id: &str) -> Result<Option<QueueEntry>> {
    let row = sqlx::query_as::<_, EntryRow>(
        r#"
        SELECT id, venue_id, singer_id, song_title, artist, status, position,
               requested_at, completed_at
        FROM queue_entries
        WHERE venue_id = ? AND status IN ('waiting', 'up_next')
        ORDER BY position ASC
        LIMIT 1
        "#,
    )
    .bind(venue_id)
    .fetch_optional(db)
    .await?;

    row.map(entry_from_row).transpose()
}

/// Write a new status (and completion time, when terminal) for an entry
///
/// The state machine is enforced by the caller; this only guarantees the
/// row exists.
pub async fn update_status(
    db: &SqlitePool,
    entry_id: Uuid,
    status: EntryStatus,
    completed_at: Option<DateTime<Utc>>,
) -> Result<()> {
    let result = sqlx::query("UPDATE queue_entries SET status = ?, completed_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(completed_at.map(|at| at.to_rfc3339()))
        .bind(entry_id.to_string())
        .execute(db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Queue entry not found: {}", entry_id)));
    }

    Ok(())
}

/// Mark an entry now_singing only if no other entry in the venue already is
///
/// Single conditional statement, so two concurrent promotions cannot both
/// succeed. Returns false when another performer holds the slot.
pub async fn promote_if_sole_singer(
    db: &SqlitePool,
    entry_id: Uuid,
    venue_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE queue_entries SET status = 'now_singing'
        WHERE id = ?
          AND NOT EXISTS (
              SELECT 1 FROM queue_entries
              WHERE venue_id = ? AND status = 'now_singing' AND id != ?
          )
        "#,
    )
    .bind(entry_id.to_string())
    .bind(venue_id)
    .bind(entry_id.to_string())
    .execute(db)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Counts for wait math: (strictly ahead of `position`, total active)
///
/// "Ahead" excludes the performing entry; the singer on stage is not part
/// of anyone's remaining wait.
pub async fn wait_counts(db: &SqlitePool, venue_id: &str, position: i64) -> Result<(i64, i64)> {
    let ahead: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM queue_entries
        WHERE venue_id = ? AND status IN ('waiting', 'up_next') AND position < ?
        "#,
    )
    .bind(venue_id)
    .bind(position)
    .fetch_one(db)
    .await?;

    let total_active: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM queue_entries
        WHERE venue_id = ? AND status IN ('waiting', 'up_next', 'now_singing')
        "#,
    )
    .bind(venue_id)
    .fetch_one(db)
    .await?;

    Ok((ahead, total_active))
}

/// Move an active entry to `to_rank` within the venue's serving order
///
/// The permutation redistributes the existing position values among the
/// active entries; no position is minted and none is compacted. Runs in a
/// transaction: changed rows park on negated positions first so the partial
/// unique index never sees a transient duplicate.
pub async fn reorder_entry(db: &SqlitePool, entry_id: Uuid, to_rank: usize) -> Result<QueueEntry> {
    let mut tx = db.begin().await?;

    let row = sqlx::query_as::<_, EntryRow>(
        r#"
        SELECT id, venue_id, singer_id, song_title, artist, status, position,
               requested_at, completed_at
        FROM queue_entries
        WHERE id = ?
        "#,
    )
    .bind(entry_id.to_string())
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Queue entry not found: {}", entry_id)))?;
    let entry = entry_from_row(row)?;

    if entry.status.is_terminal() {
        return Err(Error::Validation(format!(
            "Cannot reorder {} entry {}",
            entry.status, entry_id
        )));
    }

    let active: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT id, position FROM queue_entries
        WHERE venue_id = ? AND status IN ('waiting', 'up_next', 'now_singing')
        ORDER BY position ASC
        "#,
    )
    .bind(&entry.venue_id)
    .fetch_all(&mut *tx)
    .await?;

    if to_rank >= active.len() {
        return Err(Error::Validation(format!(
            "Rank {} out of range for {} active entries",
            to_rank,
            active.len()
        )));
    }

    let moving_id = entry.id.to_string();
    let from_rank = active
        .iter()
        .position(|(id, _)| *id == moving_id)
        .ok_or_else(|| Error::Internal(format!("Entry {} missing from active set", entry_id)))?;

    if from_rank != to_rank {
        let positions: Vec<i64> = active.iter().map(|(_, position)| *position).collect();
        let mut order: Vec<String> = active.into_iter().map(|(id, _)| id).collect();
        let moved = order.remove(from_rank);
        order.insert(to_rank, moved);

        // Phase 1: every entry whose position changes parks on the negated
        // target. Unchanged rows are untouched.
        for (id, position) in order.iter().zip(&positions) {
            sqlx::query("UPDATE queue_entries SET position = ? WHERE id = ? AND position != ?")
                .bind(-position)
                .bind(id)
                .bind(position)
                .execute(&mut *tx)
                .await?;
        }

        // Phase 2: flip parked rows to their final positions. Every final
        // position was vacated in phase 1, so no row-level collision occurs.
        sqlx::query("UPDATE queue_entries SET position = -position WHERE venue_id = ? AND position < 0")
            .bind(&entry.venue_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    get_entry(db, entry_id).await
}
