//! Database operations for the queue daemon
//!
//! Schema creation lives in encore-common; this module holds the queries
//! the daemon itself runs against `queue_entries` and `venue_devices`.

pub mod devices;
pub mod queue;
