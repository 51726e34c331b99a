//! HTTP server setup and routing

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use encore_common::events::ChangeNotifier;

use crate::service::QueueService;

/// Shared application context passed to all handlers
///
/// AppContext implements Clone, which gives us `FromRef<AppContext>` for
/// free via Axum's blanket implementation.
#[derive(Clone)]
pub struct AppContext {
    pub service: Arc<QueueService>,
    pub notifier: ChangeNotifier,
    pub db_pool: SqlitePool,
}

/// Build the daemon's router
///
/// Separate from serving so integration tests can drive the router
/// directly.
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))

        // Queue reads and mutations
        .route("/venues/:venue_id/queue", post(super::handlers::enqueue))
        .route("/venues/:venue_id/queue", get(super::handlers::get_queue))
        .route("/venues/:venue_id/wait/:singer_id", get(super::handlers::get_wait_info))
        .route("/queue/:entry_id/status", post(super::handlers::transition_status))
        .route("/queue/:entry_id/reorder", post(super::handlers::reorder))

        // SSE change stream, one venue per connection
        .route("/venues/:venue_id/events", get(super::sse::venue_events))

        // Playback device probe
        .route("/venues/:venue_id/device/test", post(super::handlers::test_device))

        // Attach application context
        .with_state(ctx)

        // Request/response logging
        .layer(TraceLayer::new_for_http())

        // Enable CORS for venue tablets and singer phones
        .layer(CorsLayer::permissive())
}
