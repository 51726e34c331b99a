//! Automatic queue advancement
//!
//! One controller per venue with an enabled playback device. Each tick
//! samples the deck; when the current track enters its finish band the
//! controller completes the performing entry, promotes the next singer, and
//! tells the deck to load and start their song.
//!
//! Device commands are fire-and-forget, so a failed load leaves the queue
//! advanced but the deck stale. The controller records the promoted entry as
//! a pending load and retries it on following ticks with the finish check
//! suspended, otherwise the deck's stale end-of-track reading would complete
//! the singer who just went up.

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use encore_common::db::{settings, QueueEntry};
use encore_common::model::EntryStatus;
use encore_common::Result;

use crate::db;
use crate::deck::{DeckClient, DeckControl};
use crate::service::QueueService;

pub struct AutoAdvanceController {
    venue_id: String,
    service: Arc<QueueService>,
    deck: Arc<dyn DeckControl>,
    interval: Duration,
    pending_load: Option<Uuid>,
}

impl AutoAdvanceController {
    pub fn new(
        venue_id: String,
        service: Arc<QueueService>,
        deck: Arc<dyn DeckControl>,
        interval: Duration,
    ) -> Self {
        Self { venue_id, service, deck, interval, pending_load: None }
    }

    /// Run the tick loop until the daemon shuts down
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            // Device round trips can outlast the interval; don't burst after
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(venue_id = %self.venue_id, interval_ms = self.interval.as_millis() as u64,
                "auto-advance controller started");
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    /// One advancement check. Never returns an error: a failed tick is
    /// retried from scratch on the next one.
    pub async fn tick(&mut self) {
        if let Some(entry_id) = self.pending_load {
            self.retry_pending_load(entry_id).await;
            return;
        }

        let Some(snapshot) = self.deck.now_playing().await else {
            debug!(venue_id = %self.venue_id, "deck idle or unreachable");
            return;
        };

        if !snapshot.is_track_finished() {
            return;
        }

        let current = match self.service.current_now_singing(&self.venue_id).await {
            Ok(Some(entry)) => entry,
            // Deck is playing something but nobody is marked performing;
            // starting the first singer is the KJ's call, not ours
            Ok(None) => return,
            Err(e) => {
                warn!(venue_id = %self.venue_id, error = %e, "failed to look up performer");
                return;
            }
        };

        info!(
            venue_id = %self.venue_id,
            entry_id = %current.id,
            track = %snapshot.title,
            "track finished, advancing queue"
        );

        if let Err(e) = self
            .service
            .transition_status(current.id, EntryStatus::Completed)
            .await
        {
            warn!(venue_id = %self.venue_id, error = %e, "failed to complete finished entry");
            return;
        }

        let next = match self.service.next_up(&self.venue_id).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                info!(venue_id = %self.venue_id, "queue is empty, nothing to start");
                return;
            }
            Err(e) => {
                warn!(venue_id = %self.venue_id, error = %e, "failed to look up next singer");
                return;
            }
        };

        if let Err(e) = self
            .service
            .transition_status(next.id, EntryStatus::NowSinging)
            .await
        {
            warn!(venue_id = %self.venue_id, entry_id = %next.id, error = %e,
                "failed to promote next singer");
            return;
        }

        self.load_and_start(&next).await;
    }

    async fn retry_pending_load(&mut self, entry_id: Uuid) {
        let entry = match self.service.entry(entry_id).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(venue_id = %self.venue_id, entry_id = %entry_id, error = %e,
                    "pending load entry unavailable, dropping it");
                self.pending_load = None;
                return;
            }
        };

        // The KJ may have skipped or completed the singer since promotion
        if entry.status != EntryStatus::NowSinging {
            debug!(venue_id = %self.venue_id, entry_id = %entry_id,
                "pending load overtaken by a manual transition");
            self.pending_load = None;
            return;
        }

        self.load_and_start(&entry).await;
    }

    async fn load_and_start(&mut self, entry: &QueueEntry) {
        let loaded = self
            .deck
            .search_and_load(&entry.song_title, &entry.artist)
            .await;
        let started = loaded && self.deck.play().await;

        if started {
            info!(
                venue_id = %self.venue_id,
                entry_id = %entry.id,
                "started '{}' for {}",
                entry.song_title,
                entry.singer_id
            );
            self.pending_load = None;
        } else {
            warn!(
                venue_id = %self.venue_id,
                entry_id = %entry.id,
                "deck did not confirm load/play, will retry"
            );
            self.pending_load = Some(entry.id);
        }
    }
}

/// Start one auto-advance controller per enabled venue device
///
/// Returns the number of controllers started. Venues without a device are
/// simply never advanced automatically.
pub async fn start_auto_advance(db: &SqlitePool, service: Arc<QueueService>) -> Result<usize> {
    let devices = db::devices::list_enabled(db).await?;
    if devices.is_empty() {
        info!("no venue devices registered, queue advancement is manual");
        return Ok(0);
    }

    let timeout = Duration::from_millis(settings::load_device_timeout(db).await?);
    let settle_delay = Duration::from_millis(settings::load_device_settle_delay(db).await?);
    let interval = Duration::from_millis(settings::load_advance_interval(db).await?);

    let mut started = 0;
    for device in devices {
        let deck = match DeckClient::new(&device, timeout, settle_delay) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!(venue_id = %device.venue_id, error = %e, "skipping venue device");
                continue;
            }
        };

        // Startup probe is informational; an offline deck just means every
        // tick reports idle until it comes back
        match deck.test_connection().await {
            Ok(version) => {
                info!(venue_id = %device.venue_id, version, "playback device reachable");
                service
                    .change_notifier()
                    .device_status_changed(&device.venue_id, true, &version);
            }
            Err(e) => {
                warn!(venue_id = %device.venue_id, error = %e, "playback device unreachable");
                service
                    .change_notifier()
                    .device_status_changed(&device.venue_id, false, &e.to_string());
            }
        }

        AutoAdvanceController::new(
            device.venue_id.clone(),
            Arc::clone(&service),
            deck,
            interval,
        )
        .spawn();
        started += 1;
    }

    info!(started, "auto-advance controllers running");
    Ok(started)
}
