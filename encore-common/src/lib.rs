//! # Encore Common Library
//!
//! Shared code for the Encore queue daemon and its in-process clients:
//! - Queue entry model and status state machine
//! - Event types (VenueEvent enum) and the ChangeNotifier bus
//! - Client-side queue synchronization (push + polling backstop)
//! - Lyrics timeline computation
//! - Database schema and initialization
//! - Configuration resolution

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod lyrics;
pub mod model;
pub mod notify;
pub mod sync;

pub use error::{Error, Result};
pub use model::EntryStatus;
