//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::EntryStatus;

/// One singer's song request in a venue's queue
///
/// `position` is assigned once at enqueue time and is unique among the
/// venue's active entries; terminal entries keep their historical position
/// but drop out of ordering and wait math.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub venue_id: String,
    pub singer_id: String,
    pub song_title: String,
    pub artist: String,
    pub status: EntryStatus,
    pub position: i64,
    pub requested_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Playback-device registration for a venue
///
/// One enabled row per venue yields one protocol client plus one
/// auto-advance controller at daemon startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub venue_id: String,
    pub host: String,
    pub port: u16,
    pub credential: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub key: String,
    pub value: String,
}
