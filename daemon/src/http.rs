use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tracing::{info, warn};

use stovewatch_common::WatchdogSnapshot;

#[derive(Clone)]
struct HttpState {
    snapshot: Arc<Mutex<WatchdogSnapshot>>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(rename = "nowEpoch")]
    now_epoch: i64,
    watchdog: WatchdogSnapshot,
}

/// Read-only observation surface: anything that wants to alert on a FAILED
/// watchdog can poll this instead of scraping logs.
pub fn spawn(port: u16, snapshot: Arc<Mutex<WatchdogSnapshot>>) {
    tokio::spawn(async move {
        if let Err(err) = serve(port, snapshot).await {
            warn!("status server failed: {err:#}");
        }
    });
}

async fn serve(port: u16, snapshot: Arc<Mutex<WatchdogSnapshot>>) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/api/status", get(handle_get_status))
        .with_state(HttpState { snapshot });

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind status server at {addr}"))?;

    info!("status server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn handle_get_status(State(state): State<HttpState>) -> impl IntoResponse {
    let watchdog = state.snapshot.lock().await.clone();
    Json(StatusResponse {
        now_epoch: Utc::now().timestamp(),
        watchdog,
    })
}
