//! Database schema and models
//!
//! Queries live with their owning service in the daemon crate; this module
//! owns the schema itself so tests and tools initialize it the same way the
//! daemon does.

pub mod init;
pub mod models;
pub mod settings;

pub use init::*;
pub use models::*;
