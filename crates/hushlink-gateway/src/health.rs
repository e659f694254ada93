//! Health check endpoint for uptime monitors.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Instant;
use tracing::{error, info};

async fn health_handler(started: Instant) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "bot": "hushlink",
        "uptime_seconds": started.elapsed().as_secs(),
    }))
}

/// Serve `GET /health` until the process exits.
pub async fn serve(addr: SocketAddr) {
    let started = Instant::now();
    let app = Router::new().route("/health", get(move || health_handler(started)));

    info!("Health endpoint listening on http://{}/health", addr);
    if let Err(e) = axum::Server::bind(&addr).serve(app.into_make_service()).await {
        error!("Health endpoint stopped: {}", e);
    }
}
