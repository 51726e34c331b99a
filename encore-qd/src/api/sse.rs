//! Server-Sent Events stream of venue change signals
//!
//! Events are advisory invalidation hints; a client that misses some (or
//! all) of them still converges through its polling backstop. One stream
//! serves one venue: the bus is global, so each connection filters.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use crate::api::server::AppContext;

/// GET /venues/:venue_id/events - SSE stream of one venue's events
pub async fn venue_events(
    State(ctx): State<AppContext>,
    Path(venue_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!(venue_id, "new SSE client connected");

    let rx = ctx.notifier.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let venue_id = venue_id.clone();
        async move {
            match result {
                Ok(event) if event.venue_id() == venue_id => {
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!(venue_id, "broadcasting SSE event: {}", event.event_type());
                            Some(Ok(Event::default().event(event.event_type()).data(json)))
                        }
                        Err(e) => {
                            warn!("Failed to serialize event: {}", e);
                            None
                        }
                    }
                }
                // Event for another venue
                Ok(_) => None,
                Err(e) => {
                    // Lagged or closed; the client's poll backstop covers it
                    warn!("SSE stream error: {:?}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
