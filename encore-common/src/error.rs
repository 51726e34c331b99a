//! Error types shared across the Encore workspace
//!
//! One taxonomy for the queue core and its clients, defined with thiserror.
//! Queue-rule violations (`Validation`, `InvalidTransition`, `Conflict`) are
//! distinct variants so callers can map them to precise API responses instead
//! of pattern-matching on message strings.

use thiserror::Error;

use crate::model::EntryStatus;

/// Main error type for Encore modules
#[derive(Error, Debug)]
pub enum Error {
    /// Rejected input (empty song title, malformed id, bad reorder target)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Status change not allowed by the entry state machine
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: EntryStatus, to: EntryStatus },

    /// Operation would violate a queue invariant (e.g. a second now_singing)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Playback device unreachable or returned garbage
    #[error("Device error: {0}")]
    Device(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the Encore Error
pub type Result<T> = std::result::Result<T, Error>;
