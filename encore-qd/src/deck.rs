//! Playback device protocol client
//!
//! Karaoke decks expose two HTTP endpoints: `/query` evaluates a read-only
//! script and returns the result as plain text, `/execute` runs a command
//! script and returns the literal text "true" or "false". The device is a
//! black box beyond that; command "success" only means the script ran, so
//! the auto-advance controller re-checks outcomes on its next tick instead
//! of trusting these booleans.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use encore_common::db::DeviceConfig;
use encore_common::model::PlaybackSnapshot;
use encore_common::{Error, Result};

/// Gap between the two position samples of the is-playing check
const PLAYING_PROBE_GAP: Duration = Duration::from_millis(100);

/// Control verbs the auto-advance controller needs from a deck
///
/// `DeckClient` is the real implementation; tests substitute scripted
/// doubles.
#[async_trait]
pub trait DeckControl: Send + Sync {
    async fn now_playing(&self) -> Option<PlaybackSnapshot>;
    async fn search_and_load(&self, title: &str, artist: &str) -> bool;
    async fn play(&self) -> bool;
    async fn pause(&self) -> bool;
}

pub struct DeckClient {
    venue_id: String,
    base_url: String,
    credential: Option<String>,
    settle_delay: Duration,
    http: reqwest::Client,
}

impl DeckClient {
    /// Build a client for one venue's device
    ///
    /// `timeout` bounds every request; `settle_delay` is the pause between
    /// issuing a search and loading its top hit.
    pub fn new(device: &DeviceConfig, timeout: Duration, settle_delay: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Device(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            venue_id: device.venue_id.clone(),
            base_url: format!("http://{}:{}", device.host, device.port),
            credential: device.credential.clone(),
            settle_delay,
            http,
        })
    }

    pub fn venue_id(&self) -> &str {
        &self.venue_id
    }

    /// Evaluate a read-only script on the device
    async fn query(&self, script: &str) -> Result<String> {
        let mut request = self
            .http
            .get(format!("{}/query", self.base_url))
            .query(&[("script", script)]);
        if let Some(credential) = &self.credential {
            request = request.query(&[("auth", credential)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Device(format!("Query '{}' failed: {}", script, e)))?;
        if !response.status().is_success() {
            return Err(Error::Device(format!(
                "Query '{}' returned {}",
                script,
                response.status()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Device(format!("Query '{}' body unreadable: {}", script, e)))?;
        Ok(text.trim().to_string())
    }

    async fn query_f64(&self, script: &str) -> Result<f64> {
        let text = self.query(script).await?;
        text.parse::<f64>().map_err(|e| {
            Error::Device(format!("Query '{}' returned non-numeric '{}': {}", script, text, e))
        })
    }

    /// Run a command script; any transport failure collapses to false
    async fn execute(&self, script: &str) -> bool {
        let mut request = self
            .http
            .get(format!("{}/execute", self.base_url))
            .query(&[("script", script)]);
        if let Some(credential) = &self.credential {
            request = request.query(&[("auth", credential)]);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => match response.text().await {
                Ok(text) => text.trim() == "true",
                Err(e) => {
                    warn!(venue_id = %self.venue_id, "Execute '{}' body unreadable: {}", script, e);
                    false
                }
            },
            Ok(response) => {
                warn!(
                    venue_id = %self.venue_id,
                    "Execute '{}' returned {}",
                    script,
                    response.status()
                );
                false
            }
            Err(e) => {
                debug!(venue_id = %self.venue_id, "Execute '{}' failed: {}", script, e);
                false
            }
        }
    }

    /// Probe the device, returning its version string
    pub async fn test_connection(&self) -> Result<String> {
        self.query("get_version").await
    }

    /// Snapshot the playing track, or None when the device is idle,
    /// unreachable, or cannot answer the essential queries
    pub async fn now_playing(&self) -> Option<PlaybackSnapshot> {
        let (title, artist, ratio, length, bpm, key) = tokio::join!(
            self.query("get_title"),
            self.query("get_artist"),
            self.query_f64("get_position"),
            self.query_f64("get_length"),
            self.query_f64("get_bpm"),
            self.query("get_key"),
        );

        let (title, artist, first_ratio, length_seconds) = match (title, artist, ratio, length) {
            (Ok(title), Ok(artist), Ok(ratio), Ok(length)) => (title, artist, ratio, length),
            _ => {
                debug!(venue_id = %self.venue_id, "now-playing probe failed, treating deck as idle");
                return None;
            }
        };

        // Nothing loaded
        if title.is_empty() && artist.is_empty() {
            return None;
        }

        // The deck reports position as a 0..1 fraction of the track
        let position_seconds = first_ratio * length_seconds;

        // A loaded track is probably playing; corroborate by sampling the
        // position again and checking it moved. If the second sample fails,
        // fall back to the position being inside the track.
        tokio::time::sleep(PLAYING_PROBE_GAP).await;
        let is_playing = match self.query_f64("get_position").await {
            Ok(second_ratio) => second_ratio > first_ratio,
            Err(_) => position_seconds >= 0.0 && position_seconds < length_seconds,
        };

        Some(PlaybackSnapshot {
            title,
            artist,
            position_seconds,
            length_seconds,
            is_playing,
            bpm: bpm.unwrap_or(0.0),
            key: key.unwrap_or_default(),
        })
    }

    /// Search the deck's library and load the top hit
    ///
    /// The protocol has no search-complete signal, so a fixed settle delay
    /// sits between the search and the load.
    pub async fn search_and_load(&self, title: &str, artist: &str) -> bool {
        let script = search_script(title, artist);
        if !self.execute(&script).await {
            warn!(venue_id = %self.venue_id, "Deck rejected search '{}'", script);
        }

        tokio::time::sleep(self.settle_delay).await;
        self.execute("load_first_result").await
    }

    pub async fn play(&self) -> bool {
        self.execute("play").await
    }

    pub async fn pause(&self) -> bool {
        self.execute("pause").await
    }

    pub async fn mute_vocals(&self) -> bool {
        self.execute("vocals off").await
    }

    pub async fn unmute_vocals(&self) -> bool {
        self.execute("vocals on").await
    }

    /// Set output volume on the KJ's 0-100 scale; out-of-range input clamps
    pub async fn set_volume(&self, level: i64) -> bool {
        self.execute(&format!("set_volume {:.2}", normalize_volume(level)))
            .await
    }
}

#[async_trait]
impl DeckControl for DeckClient {
    async fn now_playing(&self) -> Option<PlaybackSnapshot> {
        DeckClient::now_playing(self).await
    }

    async fn search_and_load(&self, title: &str, artist: &str) -> bool {
        DeckClient::search_and_load(self, title, artist).await
    }

    async fn play(&self) -> bool {
        DeckClient::play(self).await
    }

    async fn pause(&self) -> bool {
        DeckClient::pause(self).await
    }
}

/// Map the KJ volume scale (0-100) onto the deck's 0.0-1.0 gain
fn normalize_volume(level: i64) -> f64 {
    level.clamp(0, 100) as f64 / 100.0
}

/// Build the search script from a request's title and artist
///
/// Double quotes would terminate the script's string literal early, so they
/// are stripped from the terms.
fn search_script(title: &str, artist: &str) -> String {
    let terms = format!("{} {}", title, artist);
    let terms = terms.replace('"', "");
    format!("search \"{}\"", terms.trim())
}
