//! Encore Queue Daemon (encore-qd) - Main entry point
//!
//! Owns the live performance queue: HTTP API + SSE for venue clients, and
//! one auto-advance controller per venue with a registered playback device.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use encore_common::config;
use encore_common::db::init_database;
use encore_common::events::ChangeNotifier;
use encore_common::notify::LogNotifier;
use encore_qd::service::QueueService;
use encore_qd::{advance, api};

/// Command-line arguments for encore-qd
#[derive(Parser, Debug)]
#[command(name = "encore-qd")]
#[command(about = "Performance queue daemon for Encore karaoke venues")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5750", env = "ENCORE_QD_PORT")]
    port: u16,

    /// Database file path (overrides ENCORE_DB and the config file)
    #[arg(short, long, env = "ENCORE_DB")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "encore_qd=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    info!("Starting Encore queue daemon on port {}", args.port);

    let db_path = config::resolve_database_path(args.database.as_ref())
        .context("Failed to resolve database path")?;
    info!("Database: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;

    let notifier = ChangeNotifier::new(128);
    let service = Arc::new(QueueService::new(
        pool.clone(),
        notifier.clone(),
        Arc::new(LogNotifier),
    ));

    // One controller per venue with an enabled playback device
    advance::start_auto_advance(&pool, Arc::clone(&service))
        .await
        .context("Failed to start auto-advance controllers")?;

    // Build the application router
    let ctx = api::AppContext { service, notifier, db_pool: pool };
    let app = api::create_router(ctx);

    // Create socket address
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));

    info!("Starting HTTP server on {}", addr);

    // Create and run the server
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
