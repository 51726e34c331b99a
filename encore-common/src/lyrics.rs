//! Lyrics timeline computation
//!
//! Given a performance's start timestamp and a lyric sheet, computes which
//! line is "active" at wall-clock time. Synced sheets carry per-line
//! timestamps; unsynced sheets advance one line per fixed interval. The
//! result is a pure function of (start time, now), restartable and
//! idempotent, so a TV display that reconnects mid-song lands on the same
//! line as one that watched from the start.
//!
//! **Design:**
//! - Synced lines sorted by timestamp ascending at construction
//! - Current index cached for O(1) typical-case performance; the cache
//!   never changes the returned value

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One line of a synced lyric sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LyricLine {
    /// Offset from the start of the performance, in seconds
    pub at_seconds: f64,
    pub text: String,
}

/// Lyric source for one song, keyed externally by title+artist
///
/// Synced sheets come from timestamped sources (LRC-style); unsynced sheets
/// are plain line lists that advance on a fixed cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LyricSheet {
    Synced(Vec<LyricLine>),
    Unsynced(Vec<String>),
}

impl LyricSheet {
    /// Number of lines in the sheet
    pub fn len(&self) -> usize {
        match self {
            LyricSheet::Synced(lines) => lines.len(),
            LyricSheet::Unsynced(lines) => lines.len(),
        }
    }

    /// Check if the sheet has no lines
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Active-line tracker for one performance
///
/// Construct once when the performance starts; query with the current
/// wall-clock time. The only internal state is a cached index used to skip
/// the search on consecutive queries within the same line.
#[derive(Debug, Clone)]
pub struct LyricsTimeline {
    started_at: DateTime<Utc>,
    sheet: LyricSheet,

    /// Seconds each line stays active in an unsynced sheet
    line_interval_secs: f64,

    /// Cached index of the line returned by the previous query
    ///
    /// - None: no query yet, or the previous answer was "no active line"
    /// - Some(index): previous query landed on this line
    cached_index: Option<usize>,
}

impl LyricsTimeline {
    /// Create a timeline for a performance that started at `started_at`
    ///
    /// Synced lines are sorted by timestamp ascending. `unsynced_line_interval`
    /// only applies to unsynced sheets.
    pub fn new(
        started_at: DateTime<Utc>,
        sheet: LyricSheet,
        unsynced_line_interval: Duration,
    ) -> Self {
        let sheet = match sheet {
            LyricSheet::Synced(mut lines) => {
                lines.sort_by(|a, b| {
                    a.at_seconds
                        .partial_cmp(&b.at_seconds)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                LyricSheet::Synced(lines)
            }
            unsynced => unsynced,
        };

        // A zero interval would pin division below; the settings loader
        // clamps to >= 1s but direct construction must not divide by zero
        let line_interval_secs = unsynced_line_interval.as_secs_f64().max(0.001);

        Self {
            started_at,
            sheet,
            line_interval_secs,
            cached_index: None,
        }
    }

    /// Active line index at wall-clock time `now`
    ///
    /// Returns None before the performance start, before the first synced
    /// timestamp, or for an empty sheet. Past the end of the sheet the last
    /// line stays active.
    ///
    /// **Algorithm:**
    /// 1. Check cached index first (O(1) hot path while a line is active)
    /// 2. Otherwise recompute from elapsed time (O(n) synced cold path)
    pub fn active_line(&mut self, now: DateTime<Utc>) -> Option<usize> {
        let elapsed = (now - self.started_at).num_milliseconds() as f64 / 1000.0;

        if elapsed < 0.0 || self.sheet.is_empty() {
            self.cached_index = None;
            return None;
        }

        // HOT PATH: still within the cached line's time range
        if let Some(index) = self.cached_index {
            if self.line_covers(index, elapsed) {
                return Some(index);
            }
        }

        // COLD PATH: search for the line covering this instant
        let found = self.compute_index(elapsed);
        self.cached_index = found;
        found
    }

    /// Active line index without updating the cache
    ///
    /// Read-only query for callers that hold the timeline behind a shared
    /// reference; same answer as `active_line` for the same instant.
    pub fn peek_line(&self, now: DateTime<Utc>) -> Option<usize> {
        let elapsed = (now - self.started_at).num_milliseconds() as f64 / 1000.0;
        if elapsed < 0.0 || self.sheet.is_empty() {
            return None;
        }
        self.compute_index(elapsed)
    }

    /// Text of a line by index
    pub fn line_text(&self, index: usize) -> Option<&str> {
        match &self.sheet {
            LyricSheet::Synced(lines) => lines.get(index).map(|l| l.text.as_str()),
            LyricSheet::Unsynced(lines) => lines.get(index).map(|s| s.as_str()),
        }
    }

    /// When the performance started
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Number of lines in the sheet
    pub fn len(&self) -> usize {
        self.sheet.len()
    }

    /// Check if the sheet has no lines
    pub fn is_empty(&self) -> bool {
        self.sheet.is_empty()
    }

    /// True when `elapsed` falls inside line `index`'s active range
    fn line_covers(&self, index: usize, elapsed: f64) -> bool {
        match &self.sheet {
            LyricSheet::Synced(lines) => {
                let Some(line) = lines.get(index) else {
                    return false;
                };
                if elapsed < line.at_seconds {
                    return false;
                }
                match lines.get(index + 1) {
                    Some(next) => elapsed < next.at_seconds,
                    // Last line stays active to the end
                    None => true,
                }
            }
            LyricSheet::Unsynced(lines) => {
                let start = index as f64 * self.line_interval_secs;
                let is_last = index + 1 == lines.len();
                elapsed >= start && (is_last || elapsed < start + self.line_interval_secs)
            }
        }
    }

    /// Full search: last line whose start ≤ elapsed
    fn compute_index(&self, elapsed: f64) -> Option<usize> {
        match &self.sheet {
            LyricSheet::Synced(lines) => {
                let mut active = None;
                for (i, line) in lines.iter().enumerate() {
                    if line.at_seconds <= elapsed {
                        active = Some(i);
                    } else {
                        break;
                    }
                }
                active
            }
            LyricSheet::Unsynced(lines) => {
                let index = (elapsed / self.line_interval_secs) as usize;
                Some(index.min(lines.len() - 1))
            }
        }
    }
}
