//! HTTP API for the queue daemon
//!
//! Queue reads and mutations, per-venue SSE change streams, and a device
//! reachability probe. Everything rides on the shared `AppContext`.

pub mod handlers;
pub mod server;
pub mod sse;

pub use server::{create_router, AppContext};
