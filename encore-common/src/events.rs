//! Event types and the ChangeNotifier bus
//!
//! Events are broadcast in-process via `ChangeNotifier` and serialized for
//! SSE transmission to remote clients. Delivery is best-effort at-most-once:
//! a dropped event is never an error because every consumer either refetches
//! the full queue on any signal (QueueSync) or treats events as advisory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Why a venue's queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueChangeTrigger {
    Enqueued,
    Reordered,
    StatusChanged,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::Enqueued => write!(f, "enqueued"),
            QueueChangeTrigger::Reordered => write!(f, "reordered"),
            QueueChangeTrigger::StatusChanged => write!(f, "status_changed"),
        }
    }
}

/// Encore event types
///
/// Broadcast to every subscriber; consumers filter by `venue_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VenueEvent {
    /// The venue's queue changed in some way. Pure invalidation hint:
    /// consumers must refetch rather than patch. `trigger` and `entry_id`
    /// are diagnostic only.
    QueueChanged {
        venue_id: String,
        entry_id: Uuid,
        trigger: QueueChangeTrigger,
        timestamp: DateTime<Utc>,
    },

    /// The venue's playback device became reachable or unreachable.
    DeviceStatusChanged {
        venue_id: String,
        reachable: bool,
        detail: String,
        timestamp: DateTime<Utc>,
    },
}

impl VenueEvent {
    /// Venue this event belongs to, for subscriber-side filtering
    pub fn venue_id(&self) -> &str {
        match self {
            VenueEvent::QueueChanged { venue_id, .. } => venue_id,
            VenueEvent::DeviceStatusChanged { venue_id, .. } => venue_id,
        }
    }

    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            VenueEvent::QueueChanged { .. } => "QueueChanged",
            VenueEvent::DeviceStatusChanged { .. } => "DeviceStatusChanged",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// Lag and drops are acceptable here: QueueSync treats a lagged receiver as
/// one more invalidation signal and its polling backstop bounds staleness.
#[derive(Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<VenueEvent>,
    capacity: usize,
}

impl ChangeNotifier {
    /// Create a notifier with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received; subscribers rely
    /// on the initial full fetch for the starting state.
    pub fn subscribe(&self) -> broadcast::Receiver<VenueEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: VenueEvent) {
        let _ = self.tx.send(event);
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: VenueEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<VenueEvent>> {
        self.tx.send(event)
    }

    /// Publish a queue-changed invalidation hint for a venue
    pub fn queue_changed(&self, venue_id: &str, entry_id: Uuid, trigger: QueueChangeTrigger) {
        self.emit_lossy(VenueEvent::QueueChanged {
            venue_id: venue_id.to_string(),
            entry_id,
            trigger,
            timestamp: Utc::now(),
        });
    }

    /// Publish a device reachability flip for a venue
    pub fn device_status_changed(&self, venue_id: &str, reachable: bool, detail: &str) {
        self.emit_lossy(VenueEvent::DeviceStatusChanged {
            venue_id: venue_id.to_string(),
            reachable,
            detail: detail.to_string(),
            timestamp: Utc::now(),
        });
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
