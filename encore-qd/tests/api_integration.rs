//! Integration tests for the queue daemon HTTP API
//!
//! Drives the real router over an in-memory database with tower's oneshot;
//! no sockets involved.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::util::ServiceExt; // for `oneshot` method

use encore_common::db::DeviceConfig;
use encore_common::events::ChangeNotifier;
use encore_common::notify::LogNotifier;
use encore_qd::api::{create_router, AppContext};
use encore_qd::service::QueueService;

/// Test helper: build the app over a fresh in-memory database
async fn setup_app() -> (Router, SqlitePool) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    encore_common::db::create_tables(&pool).await.unwrap();

    let notifier = ChangeNotifier::new(16);
    let service = Arc::new(QueueService::new(
        pool.clone(),
        notifier.clone(),
        Arc::new(LogNotifier),
    ));
    let app = create_router(AppContext {
        service,
        notifier,
        db_pool: pool.clone(),
    });
    (app, pool)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Test helper: send a request, returning status and parsed JSON body
async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn enqueue(app: &Router, venue: &str, singer: &str, title: &str, artist: &str) -> Value {
    let (status, body) = send(
        app,
        post(
            &format!("/venues/{}/queue", venue),
            json!({ "singer_id": singer, "song_title": title, "artist": artist }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body
}

async fn transition(app: &Router, entry_id: &str, status_name: &str) -> (StatusCode, Value) {
    send(
        app,
        post(
            &format!("/queue/{}/status", entry_id),
            json!({ "status": status_name }),
        ),
    )
    .await
}

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _pool) = setup_app().await;

    let (status, body) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "encore-qd");
    assert!(body["version"].is_string());
}

// =============================================================================
// Enqueue
// =============================================================================

#[tokio::test]
async fn test_enqueue_returns_entry_with_position() {
    let (app, _pool) = setup_app().await;

    let first = enqueue(&app, "v1", "alice", "Don't Stop Believin'", "Journey").await;
    assert_eq!(first["position"], 1);
    assert_eq!(first["status"], "waiting");
    assert_eq!(first["song_title"], "Don't Stop Believin'");
    assert_eq!(first["artist"], "Journey");
    assert!(first["id"].is_string());
    assert!(first["completed_at"].is_null());

    let second = enqueue(&app, "v1", "bob", "Creep", "Radiohead").await;
    assert_eq!(second["position"], 2);
}

#[tokio::test]
async fn test_enqueue_artist_is_optional() {
    let (app, _pool) = setup_app().await;

    let (status, body) = send(
        &app,
        post(
            "/venues/v1/queue",
            json!({ "singer_id": "alice", "song_title": "Wonderwall" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["artist"], "");
}

#[tokio::test]
async fn test_enqueue_empty_title_rejected() {
    let (app, _pool) = setup_app().await;

    let (status, body) = send(
        &app,
        post(
            "/venues/v1/queue",
            json!({ "singer_id": "alice", "song_title": "   " }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("title"));
}

// =============================================================================
// Queue Listing
// =============================================================================

#[tokio::test]
async fn test_get_queue_serving_order_and_filtering() {
    let (app, _pool) = setup_app().await;

    let a = enqueue(&app, "v1", "alice", "Song A", "").await;
    enqueue(&app, "v1", "bob", "Song B", "").await;
    enqueue(&app, "v2", "carol", "Song C", "").await;

    let (status, body) = send(&app, get("/venues/v1/queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["venue_id"], "v1");
    let entries = body["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["position"], 1);
    assert_eq!(entries[1]["position"], 2);

    // Completed entries drop out of the listing
    let (status, _) = transition(&app, a["id"].as_str().unwrap(), "completed").await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, get("/venues/v1/queue")).await;
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    assert_eq!(body["entries"][0]["singer_id"], "bob");
}

#[tokio::test]
async fn test_get_queue_empty_venue() {
    let (app, _pool) = setup_app().await;

    let (status, body) = send(&app, get("/venues/nowhere/queue")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entries"].as_array().unwrap().len(), 0);
}

// =============================================================================
// Wait Info
// =============================================================================

#[tokio::test]
async fn test_wait_info_counts_singers_ahead() {
    let (app, _pool) = setup_app().await;

    let a = enqueue(&app, "v1", "alice", "Song A", "").await;
    enqueue(&app, "v1", "bob", "Song B", "").await;
    enqueue(&app, "v1", "carol", "Song C", "").await;

    let (status, body) = send(&app, get("/venues/v1/wait/carol")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"], 3);
    assert_eq!(body["ahead"], 2);
    assert_eq!(body["total_active"], 3);

    // Once alice performs, she no longer counts toward carol's wait
    transition(&app, a["id"].as_str().unwrap(), "now_singing").await;
    let (_, body) = send(&app, get("/venues/v1/wait/carol")).await;
    assert_eq!(body["ahead"], 1);
}

#[tokio::test]
async fn test_wait_info_unknown_singer_is_404() {
    let (app, _pool) = setup_app().await;

    enqueue(&app, "v1", "alice", "Song A", "").await;

    let (status, body) = send(&app, get("/venues/v1/wait/nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

// =============================================================================
// Status Transitions
// =============================================================================

#[tokio::test]
async fn test_transition_lifecycle() {
    let (app, _pool) = setup_app().await;

    let entry = enqueue(&app, "v1", "alice", "Song A", "").await;
    let id = entry["id"].as_str().unwrap();

    let (status, body) = transition(&app, id, "now_singing").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "now_singing");

    let (status, body) = transition(&app, id, "completed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert!(body["completed_at"].is_string());
}

#[tokio::test]
async fn test_transition_conflicts_are_409() {
    let (app, _pool) = setup_app().await;

    let a = enqueue(&app, "v1", "alice", "Song A", "").await;
    let b = enqueue(&app, "v1", "bob", "Song B", "").await;

    transition(&app, a["id"].as_str().unwrap(), "now_singing").await;

    // Second performer in the same venue
    let (status, body) = transition(&app, b["id"].as_str().unwrap(), "now_singing").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["status"], "error");

    // Backward transition
    let (status, _) = transition(&app, a["id"].as_str().unwrap(), "waiting").await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Out of a terminal state
    transition(&app, a["id"].as_str().unwrap(), "completed").await;
    let (status, _) = transition(&app, a["id"].as_str().unwrap(), "now_singing").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_transition_unknown_entry_is_404() {
    let (app, _pool) = setup_app().await;

    let (status, body) =
        transition(&app, "00000000-0000-0000-0000-000000000000", "completed").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_transition_unknown_status_rejected() {
    let (app, _pool) = setup_app().await;

    let entry = enqueue(&app, "v1", "alice", "Song A", "").await;
    let (status, _) = transition(&app, entry["id"].as_str().unwrap(), "singing").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// Reorder
// =============================================================================

#[tokio::test]
async fn test_reorder_moves_entry_to_front() {
    let (app, _pool) = setup_app().await;

    enqueue(&app, "v1", "alice", "Song A", "").await;
    enqueue(&app, "v1", "bob", "Song B", "").await;
    let c = enqueue(&app, "v1", "carol", "Song C", "").await;

    let (status, body) = send(
        &app,
        post(
            &format!("/queue/{}/reorder", c["id"].as_str().unwrap()),
            json!({ "to_rank": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["position"], 1);

    let (_, body) = send(&app, get("/venues/v1/queue")).await;
    let singers: Vec<&str> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["singer_id"].as_str().unwrap())
        .collect();
    assert_eq!(singers, vec!["carol", "alice", "bob"]);
    let positions: Vec<i64> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["position"].as_i64().unwrap())
        .collect();
    assert_eq!(positions, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_reorder_out_of_range_rank_is_400() {
    let (app, _pool) = setup_app().await;

    let entry = enqueue(&app, "v1", "alice", "Song A", "").await;

    let (status, body) = send(
        &app,
        post(
            &format!("/queue/{}/reorder", entry["id"].as_str().unwrap()),
            json!({ "to_rank": 7 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

// =============================================================================
// SSE Stream
// =============================================================================

#[tokio::test]
async fn test_events_endpoint_opens_sse_stream() {
    let (app, _pool) = setup_app().await;

    // Only inspect the response head; the body streams forever
    let response = app.oneshot(get("/venues/v1/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}

// =============================================================================
// Device Probe
// =============================================================================

#[tokio::test]
async fn test_device_probe_without_registration_is_404() {
    let (app, _pool) = setup_app().await;

    let (status, body) = send(&app, post("/venues/v1/device/test", json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_device_probe_reports_unreachable() {
    let (app, pool) = setup_app().await;

    // Grab a port nothing listens on
    let unused_port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    encore_qd::db::devices::upsert_device(
        &pool,
        &DeviceConfig {
            venue_id: "v1".to_string(),
            host: "127.0.0.1".to_string(),
            port: unused_port,
            credential: None,
            enabled: true,
        },
    )
    .await
    .unwrap();

    let (status, body) = send(&app, post("/venues/v1/device/test", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["venue_id"], "v1");
    assert_eq!(body["reachable"], false);
    assert!(body["message"].is_string());
    assert!(body["version"].is_null());
}
