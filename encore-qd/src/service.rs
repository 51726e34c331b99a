//! Queue operations and business rules
//!
//! `QueueService` is the only writer of queue state. Every mutation runs the
//! state-machine checks, persists, then publishes an invalidation hint on the
//! `ChangeNotifier`; singer-facing notifications are fired on a spawned task
//! so delivery can never slow a queue operation down.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use encore_common::db::QueueEntry;
use encore_common::events::{ChangeNotifier, QueueChangeTrigger};
use encore_common::model::{EntryStatus, WaitInfo};
use encore_common::notify::Notifier;
use encore_common::sync::QueueFetcher;
use encore_common::{Error, Result};

use crate::db;

#[derive(Clone)]
pub struct QueueService {
    db: SqlitePool,
    notifier: ChangeNotifier,
    notify: Arc<dyn Notifier>,
}

impl QueueService {
    pub fn new(db: SqlitePool, notifier: ChangeNotifier, notify: Arc<dyn Notifier>) -> Self {
        Self { db, notifier, notify }
    }

    /// The event bus mutations publish to
    pub fn change_notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Add a singer's request to the tail of a venue's queue
    pub async fn enqueue(
        &self,
        venue_id: &str,
        singer_id: &str,
        song_title: &str,
        artist: &str,
    ) -> Result<QueueEntry> {
        if song_title.trim().is_empty() {
            return Err(Error::Validation("Song title must not be empty".to_string()));
        }
        if singer_id.trim().is_empty() {
            return Err(Error::Validation("Singer id must not be empty".to_string()));
        }

        let entry =
            db::queue::insert_entry(&self.db, venue_id, singer_id, song_title, artist).await?;

        info!(
            venue_id,
            entry_id = %entry.id,
            singer_id,
            position = entry.position,
            "enqueued '{}'",
            entry.song_title
        );
        self.notifier
            .queue_changed(venue_id, entry.id, QueueChangeTrigger::Enqueued);

        let (ahead, _) = db::queue::wait_counts(&self.db, venue_id, entry.position).await?;
        self.notify_async(
            entry.singer_id.clone(),
            "You're in the queue".to_string(),
            format!("{} is queued with {} ahead of you", entry.song_title, ahead),
            format!("/venues/{}/queue", venue_id),
            "queue-position".to_string(),
        );

        Ok(entry)
    }

    /// Fetch a single entry by id
    pub async fn entry(&self, entry_id: Uuid) -> Result<QueueEntry> {
        db::queue::get_entry(&self.db, entry_id).await
    }

    /// Active entries for a venue in serving order
    pub async fn list_active(&self, venue_id: &str) -> Result<Vec<QueueEntry>> {
        db::queue::list_active(&self.db, venue_id).await
    }

    /// The venue's performing entry, if any
    pub async fn current_now_singing(&self, venue_id: &str) -> Result<Option<QueueEntry>> {
        db::queue::current_now_singing(&self.db, venue_id).await
    }

    /// The entry that would perform next, if any
    pub async fn next_up(&self, venue_id: &str) -> Result<Option<QueueEntry>> {
        db::queue::next_up(&self.db, venue_id).await
    }

    /// Apply a status change, enforcing the entry state machine
    ///
    /// Promotion to now_singing additionally requires the venue's performing
    /// slot to be free; completion timestamps are written exactly once, at
    /// the transition into a terminal state.
    pub async fn transition_status(
        &self,
        entry_id: Uuid,
        new_status: EntryStatus,
    ) -> Result<QueueEntry> {
        let entry = db::queue::get_entry(&self.db, entry_id).await?;

        if !entry.status.can_transition_to(new_status) {
            return Err(Error::InvalidTransition { from: entry.status, to: new_status });
        }

        if new_status == EntryStatus::NowSinging {
            let promoted =
                db::queue::promote_if_sole_singer(&self.db, entry_id, &entry.venue_id).await?;
            if !promoted {
                return Err(Error::Conflict(format!(
                    "Venue {} already has a performing entry",
                    entry.venue_id
                )));
            }
        } else {
            let completed_at = new_status.is_terminal().then(Utc::now);
            db::queue::update_status(&self.db, entry_id, new_status, completed_at).await?;
        }

        let updated = db::queue::get_entry(&self.db, entry_id).await?;
        info!(
            venue_id = %updated.venue_id,
            entry_id = %updated.id,
            from = %entry.status,
            to = %new_status,
            "queue entry transitioned"
        );
        self.notifier
            .queue_changed(&updated.venue_id, updated.id, QueueChangeTrigger::StatusChanged);

        if new_status == EntryStatus::NowSinging {
            self.notify_async(
                updated.singer_id.clone(),
                "You're up!".to_string(),
                format!("Grab the mic: {}", updated.song_title),
                format!("/venues/{}/queue", updated.venue_id),
                "queue-turn".to_string(),
            );

            if let Some(on_deck) = db::queue::next_up(&self.db, &updated.venue_id).await? {
                self.notify_async(
                    on_deck.singer_id.clone(),
                    "You're on deck".to_string(),
                    format!("{} is coming up next", on_deck.song_title),
                    format!("/venues/{}/queue", on_deck.venue_id),
                    "queue-on-deck".to_string(),
                );
            }
        }

        Ok(updated)
    }

    /// Move an active entry to a new rank in the serving order
    pub async fn reorder(&self, entry_id: Uuid, to_rank: usize) -> Result<QueueEntry> {
        let moved = db::queue::reorder_entry(&self.db, entry_id, to_rank).await?;

        info!(
            venue_id = %moved.venue_id,
            entry_id = %moved.id,
            to_rank,
            "queue entry reordered"
        );
        self.notifier
            .queue_changed(&moved.venue_id, moved.id, QueueChangeTrigger::Reordered);

        Ok(moved)
    }

    /// Wait estimate for a singer's earliest active entry, or None when the
    /// singer has nothing active at this venue
    pub async fn compute_wait_info(
        &self,
        venue_id: &str,
        singer_id: &str,
    ) -> Result<Option<WaitInfo>> {
        let Some(entry) = db::queue::active_for_singer(&self.db, venue_id, singer_id).await? else {
            return Ok(None);
        };

        let (ahead, total_active) =
            db::queue::wait_counts(&self.db, venue_id, entry.position).await?;

        Ok(Some(WaitInfo { entry_id: entry.id, position: entry.position, ahead, total_active }))
    }

    fn notify_async(&self, user_id: String, title: String, body: String, url: String, tag: String) {
        let notify = Arc::clone(&self.notify);
        tokio::spawn(async move {
            notify.notify(&user_id, &title, &body, &url, &tag).await;
        });
    }
}

#[async_trait]
impl QueueFetcher for QueueService {
    async fn fetch_active(&self, venue_id: &str) -> Result<Vec<QueueEntry>> {
        self.list_active(venue_id).await
    }
}
