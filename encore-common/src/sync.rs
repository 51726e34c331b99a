//! Client-side queue synchronization
//!
//! Dual-channel reconciliation: push signals from the ChangeNotifier trigger
//! an immediate refetch, and an unconditional fixed-interval poll bounds
//! staleness even when every push signal is lost. Every refresh replaces the
//! whole in-memory view, so signals need no ordering, deduplication, or
//! payload: any signal for the venue means "refetch".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::db::QueueEntry;
use crate::events::ChangeNotifier;
use crate::Result;

/// Source of truth for a venue's active queue
///
/// Implemented by the queue service in-process and by scripted doubles in
/// tests. Must return active entries ordered by position ascending.
#[async_trait]
pub trait QueueFetcher: Send + Sync {
    async fn fetch_active(&self, venue_id: &str) -> Result<Vec<QueueEntry>>;
}

/// One client's synchronized view of a venue's active queue
///
/// Holds the background reconciliation task; dropping (or `stop`) cancels
/// the timer and releases the notification subscription.
pub struct QueueSync {
    venue_id: String,
    view: Arc<RwLock<Vec<QueueEntry>>>,
    last_refreshed: Arc<RwLock<Option<DateTime<Utc>>>>,
    task: JoinHandle<()>,
}

impl QueueSync {
    /// Subscribe to a venue: fetch the current queue immediately, then keep
    /// the view fresh from change signals plus the polling backstop.
    pub async fn subscribe(
        venue_id: &str,
        fetcher: Arc<dyn QueueFetcher>,
        notifier: &ChangeNotifier,
        poll_interval: Duration,
    ) -> Self {
        let view = Arc::new(RwLock::new(Vec::new()));
        let last_refreshed = Arc::new(RwLock::new(None));
        let mut rx = notifier.subscribe();

        // Initial full fetch; a failure here just means the view starts
        // empty and the first successful tick fills it.
        refresh_view(venue_id, &fetcher, &view, &last_refreshed).await;

        let task = {
            let venue = venue_id.to_string();
            let fetcher = Arc::clone(&fetcher);
            let view = Arc::clone(&view);
            let last_refreshed = Arc::clone(&last_refreshed);
            tokio::spawn(async move {
                // First poll lands one full interval after subscribe; the
                // initial fetch above already covered "now"
                let start = tokio::time::Instant::now() + poll_interval;
                let mut ticker = tokio::time::interval_at(start, poll_interval);
                loop {
                    tokio::select! {
                        received = rx.recv() => match received {
                            Ok(event) => {
                                if event.venue_id() == venue {
                                    refresh_view(&venue, &fetcher, &view, &last_refreshed).await;
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                // Missed signals are just more invalidation
                                warn!(venue_id = %venue, skipped, "change feed lagged, refetching");
                                refresh_view(&venue, &fetcher, &view, &last_refreshed).await;
                            }
                            Err(RecvError::Closed) => break,
                        },
                        _ = ticker.tick() => {
                            refresh_view(&venue, &fetcher, &view, &last_refreshed).await;
                        }
                    }
                }
            })
        };

        Self {
            venue_id: venue_id.to_string(),
            view,
            last_refreshed,
            task,
        }
    }

    /// Venue this view tracks
    pub fn venue_id(&self) -> &str {
        &self.venue_id
    }

    /// Current view of the active queue, position ascending
    pub async fn snapshot(&self) -> Vec<QueueEntry> {
        self.view.read().await.clone()
    }

    /// When the view last refreshed successfully, if ever
    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        *self.last_refreshed.read().await
    }

    /// Cancel the reconciliation loop and release the subscription
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for QueueSync {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn refresh_view(
    venue_id: &str,
    fetcher: &Arc<dyn QueueFetcher>,
    view: &Arc<RwLock<Vec<QueueEntry>>>,
    last_refreshed: &Arc<RwLock<Option<DateTime<Utc>>>>,
) {
    match fetcher.fetch_active(venue_id).await {
        Ok(entries) => {
            debug!(venue_id, count = entries.len(), "queue view refreshed");
            *view.write().await = entries;
            *last_refreshed.write().await = Some(Utc::now());
        }
        Err(e) => {
            // Keep the previous view; staleness stays bounded by the next
            // successful tick
            warn!(venue_id, error = %e, "queue fetch failed, keeping stale view");
        }
    }
}
