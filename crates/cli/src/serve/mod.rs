//! `crm serve` -- HTTP JSON API over the rollup engine.
//!
//! Endpoints:
//! - GET  /health              - Server status and loaded row counts
//! - POST /latest              - Latest interaction per entity
//! - POST /rollup              - Ad hoc metric rollup over a posted dataset
//! - GET  /dashboards          - Built-in dashboards and their minimum roles
//! - GET  /dashboards/{name}   - Run a dashboard over the loaded dataset,
//!   scoped to the calling principal
//!
//! All responses use Content-Type: application/json and the
//! `{"success": ..., "data" | "error": ...}` envelope.

mod error;
mod handlers;
mod middleware;
mod state;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crm_storage::{Dataset, MemoryStore};

use crate::config::CrmConfig;

use self::handlers::{
    handle_dashboard, handle_health, handle_latest, handle_list_dashboards, handle_not_found,
    handle_rollup,
};
use self::state::AppState;

/// Maximum request body size: 10 MB.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

pub(crate) fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/latest", post(handle_latest))
        .route("/rollup", post(handle_rollup))
        .route("/dashboards", get(handle_list_dashboards))
        .route("/dashboards/{name}", get(handle_dashboard))
        .fallback(handle_not_found)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Load the configured dataset and serve until Ctrl+C.
pub async fn start_server(config: CrmConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = match &config.data.path {
        Some(path) => MemoryStore::open(path)?,
        None => {
            tracing::warn!("no dataset configured; dashboards will be empty");
            MemoryStore::new(Dataset::default())
        }
    };

    let state = Arc::new(AppState {
        store,
        page_size: config.data.page_size,
    });

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, page_size = config.data.page_size, "crm listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("received shutdown signal");
}
