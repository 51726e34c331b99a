//! HTTP request handlers
//!
//! Thin wrappers over `QueueService`: decode the request, call the service,
//! map the error taxonomy onto status codes.

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;

use encore_common::db::{settings, QueueEntry};
use encore_common::model::{EntryStatus, WaitInfo};
use encore_common::Error;

use crate::api::server::AppContext;
use crate::db;
use crate::deck::DeckClient;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub singer_id: String,
    pub song_title: String,
    #[serde(default)]
    pub artist: String,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub venue_id: String,
    pub entries: Vec<QueueEntry>,
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub status: EntryStatus,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub to_rank: usize,
}

#[derive(Debug, Serialize)]
pub struct DeviceTestResponse {
    pub venue_id: String,
    pub reachable: bool,
    pub version: Option<String>,
    pub message: Option<String>,
}

type HandlerError = (StatusCode, Json<StatusResponse>);

/// Map the error taxonomy onto HTTP status codes
fn error_response(err: Error) -> HandlerError {
    let code = match &err {
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidTransition { .. } | Error::Conflict(_) => StatusCode::CONFLICT,
        Error::Device(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if code == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Request failed: {}", err);
    }

    (
        code,
        Json(StatusResponse { status: "error".to_string(), message: err.to_string() }),
    )
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "encore-qd".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Queue Endpoints
// ============================================================================

/// POST /venues/:venue_id/queue - Add a singer's request to the queue
pub async fn enqueue(
    State(ctx): State<AppContext>,
    Path(venue_id): Path<String>,
    Json(req): Json<EnqueueRequest>,
) -> Result<Json<QueueEntry>, HandlerError> {
    ctx.service
        .enqueue(&venue_id, &req.singer_id, &req.song_title, &req.artist)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /venues/:venue_id/queue - Active entries in serving order
pub async fn get_queue(
    State(ctx): State<AppContext>,
    Path(venue_id): Path<String>,
) -> Result<Json<QueueResponse>, HandlerError> {
    let entries = ctx
        .service
        .list_active(&venue_id)
        .await
        .map_err(error_response)?;

    Ok(Json(QueueResponse { venue_id, entries }))
}

/// GET /venues/:venue_id/wait/:singer_id - Wait estimate for a singer
pub async fn get_wait_info(
    State(ctx): State<AppContext>,
    Path((venue_id, singer_id)): Path<(String, String)>,
) -> Result<Json<WaitInfo>, HandlerError> {
    match ctx.service.compute_wait_info(&venue_id, &singer_id).await {
        Ok(Some(info)) => Ok(Json(info)),
        Ok(None) => Err(error_response(Error::NotFound(format!(
            "No active entry for singer {} at venue {}",
            singer_id, venue_id
        )))),
        Err(e) => Err(error_response(e)),
    }
}

/// POST /queue/:entry_id/status - Apply a status transition
pub async fn transition_status(
    State(ctx): State<AppContext>,
    Path(entry_id): Path<Uuid>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<QueueEntry>, HandlerError> {
    ctx.service
        .transition_status(entry_id, req.status)
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /queue/:entry_id/reorder - Move an entry within the serving order
pub async fn reorder(
    State(ctx): State<AppContext>,
    Path(entry_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<Json<QueueEntry>, HandlerError> {
    ctx.service
        .reorder(entry_id, req.to_rank)
        .await
        .map(Json)
        .map_err(error_response)
}

// ============================================================================
// Device Endpoint
// ============================================================================

/// POST /venues/:venue_id/device/test - Probe the venue's playback device
///
/// Unreachable is a result, not an error: the response reports it with
/// `reachable: false` and a 200. Only a missing device row is a 404.
pub async fn test_device(
    State(ctx): State<AppContext>,
    Path(venue_id): Path<String>,
) -> Result<Json<DeviceTestResponse>, HandlerError> {
    let device = db::devices::get_device(&ctx.db_pool, &venue_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| {
            error_response(Error::NotFound(format!(
                "No device registered for venue {}",
                venue_id
            )))
        })?;

    let timeout = settings::load_device_timeout(&ctx.db_pool)
        .await
        .map_err(error_response)?;
    let settle_delay = settings::load_device_settle_delay(&ctx.db_pool)
        .await
        .map_err(error_response)?;

    let client = DeckClient::new(
        &device,
        Duration::from_millis(timeout),
        Duration::from_millis(settle_delay),
    )
    .map_err(error_response)?;

    match client.test_connection().await {
        Ok(version) => {
            info!(venue_id, version, "device probe succeeded");
            ctx.notifier.device_status_changed(&venue_id, true, &version);
            Ok(Json(DeviceTestResponse {
                venue_id,
                reachable: true,
                version: Some(version),
                message: None,
            }))
        }
        Err(e) => {
            info!(venue_id, error = %e, "device probe failed");
            ctx.notifier
                .device_status_changed(&venue_id, false, &e.to_string());
            Ok(Json(DeviceTestResponse {
                venue_id,
                reachable: false,
                version: None,
                message: Some(e.to_string()),
            }))
        }
    }
}
