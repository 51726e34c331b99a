//! Encore Queue Daemon (encore-qd)
//!
//! Owns the live performance queue for every venue: singers join through
//! the HTTP API, the KJ drives status changes, and per-venue controllers
//! watch the playback device to advance the rotation automatically when a
//! track ends.

pub mod advance;
pub mod api;
pub mod db;
pub mod deck;
pub mod service;

pub use api::{create_router, AppContext};
pub use service::QueueService;
