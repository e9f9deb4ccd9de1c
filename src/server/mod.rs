//! HTTP Server
//!
//! # Routes
//! - `GET /` - landing page with the table selector
//! - `GET /tables` - JSON listing
//! - `POST /table/{identifier}` - HTML table fragment
//! - `POST /table?q={identifier}` - same fragment, query-string form
//! - `GET /api/table/{identifier}` - JSON snapshot
//! - `/static/*` - files from the configured static directory
//!
//! Status codes: 400 unknown table, 502 connection failure, 504 timeout,
//! 500 anything else that went wrong server-side.

mod handlers;
mod templates;

use axum::routing::{get, post};
use axum::Router;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::TabulaConfig;
use crate::error::{Result, TabulaError};
use crate::viewer::Viewer;

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    viewer: Arc<Viewer>,
}

impl AppState {
    pub fn new(viewer: Viewer) -> Self {
        Self {
            viewer: Arc::new(viewer),
        }
    }
}

/// Build the application router
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/tables", get(handlers::tables))
        .route("/table", post(handlers::table_fragment_query))
        .route("/table/:identifier", post(handlers::table_fragment))
        .route("/api/table/:identifier", get(handlers::table_json))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: TabulaConfig) -> Result<()> {
    info!(
        database = %config.connection.redacted(),
        max_rows = ?config.limits.max_rows,
        timeout_ms = ?config.limits.timeout_ms,
        "starting tabula"
    );

    let state = AppState::new(Viewer::new(config.connection, config.limits));
    let app = router(state, &config.server.static_dir);

    let listener = TcpListener::bind(config.server.bind).await.map_err(|e| {
        TabulaError::config_error(format!("Failed to bind {}: {e}", config.server.bind))
    })?;

    let local = listener.local_addr().map_err(|e| {
        TabulaError::config_error(format!("Failed to read listener address: {e}"))
    })?;
    info!("listening on http://{local}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| TabulaError::config_error(format!("Server error: {e}")))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}
