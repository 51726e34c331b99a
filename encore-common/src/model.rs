//! Core domain types: entry status state machine and playback snapshot
//!
//! `EntryStatus` encodes the full lifecycle of a queue entry:
//!
//! ```text
//! waiting ──> up_next ──> now_singing ──> { completed, skipped }
//!    │            │                            ▲
//!    └────────────┴────────────────────────────┘   (cancellation paths)
//! ```
//!
//! `up_next` is advisory; it highlights the on-deck singer in UIs but orders
//! identically to `waiting`. Terminal states never transition again.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Seconds before the end of a track at which it counts as finished.
/// Position polling is not frame-accurate; without this band the finish
/// check could fire late (after the device already stopped) or double-fire
/// at the exact boundary.
pub const FINISH_GUARD_SECONDS: f64 = 2.0;

/// Lifecycle status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Waiting,
    UpNext,
    NowSinging,
    Completed,
    Skipped,
}

impl EntryStatus {
    /// All statuses that keep an entry in the active queue
    pub const ACTIVE: [EntryStatus; 3] =
        [EntryStatus::Waiting, EntryStatus::UpNext, EntryStatus::NowSinging];

    /// Entry still participates in ordering and wait math
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Completed and skipped entries never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Skipped)
    }

    /// Forward transitions only; everything else (backward moves, moves out
    /// of terminal states, self-transitions) is rejected by the service.
    pub fn can_transition_to(&self, new: EntryStatus) -> bool {
        use EntryStatus::*;
        match (self, new) {
            (Waiting, UpNext) => true,
            (Waiting, NowSinging) | (UpNext, NowSinging) => true,
            (Waiting, Completed) | (UpNext, Completed) | (NowSinging, Completed) => true,
            (Waiting, Skipped) | (UpNext, Skipped) | (NowSinging, Skipped) => true,
            _ => false,
        }
    }

    /// Wire/database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Waiting => "waiting",
            EntryStatus::UpNext => "up_next",
            EntryStatus::NowSinging => "now_singing",
            EntryStatus::Completed => "completed",
            EntryStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(EntryStatus::Waiting),
            "up_next" => Ok(EntryStatus::UpNext),
            "now_singing" => Ok(EntryStatus::NowSinging),
            "completed" => Ok(EntryStatus::Completed),
            "skipped" => Ok(EntryStatus::Skipped),
            other => Err(format!("unknown entry status: {}", other)),
        }
    }
}

/// Point-in-time view of the playback device
///
/// Produced fresh on every adapter query; never cached across ticks. `bpm`
/// and `key` are cosmetic and default to zero/empty when the device cannot
/// report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub title: String,
    pub artist: String,
    pub position_seconds: f64,
    pub length_seconds: f64,
    pub is_playing: bool,
    pub bpm: f64,
    pub key: String,
}

impl PlaybackSnapshot {
    /// True when the device is playing inside the finish guard band at the
    /// end of the track. Pure function of the snapshot.
    pub fn is_track_finished(&self) -> bool {
        self.is_playing && self.position_seconds >= self.length_seconds - FINISH_GUARD_SECONDS
    }
}

/// A singer's wait estimate within a venue's active queue
///
/// `ahead` counts active entries with a strictly smaller position, excluding
/// the one already performing. That is the user-facing number, since raw
/// position includes historical gaps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitInfo {
    pub entry_id: Uuid,
    pub position: i64,
    pub ahead: i64,
    pub total_active: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions_allowed() {
        use EntryStatus::*;
        assert!(Waiting.can_transition_to(UpNext));
        assert!(Waiting.can_transition_to(NowSinging));
        assert!(UpNext.can_transition_to(NowSinging));
        for from in [Waiting, UpNext, NowSinging] {
            assert!(from.can_transition_to(Completed));
            assert!(from.can_transition_to(Skipped));
        }
    }

    #[test]
    fn test_backward_and_terminal_transitions_rejected() {
        use EntryStatus::*;
        assert!(!NowSinging.can_transition_to(Waiting));
        assert!(!NowSinging.can_transition_to(UpNext));
        assert!(!UpNext.can_transition_to(Waiting));
        for terminal in [Completed, Skipped] {
            for to in [Waiting, UpNext, NowSinging, Completed, Skipped] {
                assert!(!terminal.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_self_transitions_rejected() {
        use EntryStatus::*;
        for status in [Waiting, UpNext, NowSinging, Completed, Skipped] {
            assert!(!status.can_transition_to(status));
        }
    }

    #[test]
    fn test_status_string_round_trip() {
        use EntryStatus::*;
        for status in [Waiting, UpNext, NowSinging, Completed, Skipped] {
            assert_eq!(status.as_str().parse::<EntryStatus>().unwrap(), status);
        }
        assert!("singing".parse::<EntryStatus>().is_err());
    }

    #[test]
    fn test_active_vs_terminal() {
        use EntryStatus::*;
        assert!(Waiting.is_active());
        assert!(UpNext.is_active());
        assert!(NowSinging.is_active());
        assert!(Completed.is_terminal());
        assert!(Skipped.is_terminal());
    }

    fn snapshot(position: f64, length: f64, playing: bool) -> PlaybackSnapshot {
        PlaybackSnapshot {
            title: "Open Arms".to_string(),
            artist: "Journey".to_string(),
            position_seconds: position,
            length_seconds: length,
            is_playing: playing,
            bpm: 0.0,
            key: String::new(),
        }
    }

    #[test]
    fn test_track_finished_inside_guard_band() {
        assert!(snapshot(198.5, 200.0, true).is_track_finished());
        assert!(snapshot(198.0, 200.0, true).is_track_finished());
        assert!(snapshot(200.0, 200.0, true).is_track_finished());
    }

    #[test]
    fn test_track_not_finished_mid_song() {
        assert!(!snapshot(0.0, 200.0, true).is_track_finished());
        assert!(!snapshot(197.9, 200.0, true).is_track_finished());
    }

    #[test]
    fn test_track_not_finished_when_paused() {
        assert!(!snapshot(199.0, 200.0, false).is_track_finished());
        assert!(!snapshot(200.0, 200.0, false).is_track_finished());
    }
}
