use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::api::{self, AppState};
use crate::audit::AuditTrail;
use crate::config::Config;
use crate::store::attachments::BlobStore;
use crate::store::{DbHandle, WorkflowDb};
use crate::ws;

/// Uploads larger than this are rejected at the body layer.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Build the full application router with the API and WebSocket endpoint.
pub fn build_router(state: Arc<AppState>) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// Start the fileroute server.
pub async fn start_server(config: Config) -> Result<()> {
    config.ensure_directories()?;

    let db =
        WorkflowDb::new(&config.db_path()).context("Failed to initialize workflow database")?;
    let (ws_tx, _rx) = broadcast::channel::<String>(256);

    let state = Arc::new(AppState {
        db: DbHandle::new(db),
        ws_tx,
        blobs: BlobStore::new(config.attachments_dir()),
        audit: Arc::new(AuditTrail::new(&config.audit_dir())),
    });

    let mut app = build_router(state);

    if config.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if config.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!("fileroute serving at http://{}", local_addr);
    println!("fileroute running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    println!("\nShutting down...");
}
