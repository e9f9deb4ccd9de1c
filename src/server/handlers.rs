//! Request handlers
//!
//! HTML handlers answer with a page or a fragment, JSON handlers with the
//! envelopes from [`crate::output`]. Failures are logged with full detail and
//! answered with the client-safe message only.

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use std::time::Instant;
use tracing::{error, warn};

use super::templates::{ErrorTemplate, IndexTemplate, TableTemplate};
use super::AppState;
use crate::error::TabulaError;
use crate::output::{ErrorEnvelope, Metadata, SuccessEnvelope};

const PAGE_TITLE: &str = "Tabula";

/// Query string of `POST /table?q=<name>`
#[derive(Debug, Deserialize)]
pub struct TableQuery {
    #[serde(default)]
    pub q: String,
}

/// HTTP status for a failed operation
#[must_use]
pub const fn status_for(err: &TabulaError) -> StatusCode {
    match err {
        TabulaError::InvalidIdentifier(_) | TabulaError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        TabulaError::Connection(_) => StatusCode::BAD_GATEWAY,
        TabulaError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        TabulaError::Query(_) | TabulaError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_failure(operation: &str, err: &TabulaError) {
    if err.is_client_error() {
        warn!(operation, code = err.error_code(), "request rejected");
    } else {
        error!(operation, code = err.error_code(), error = %err, "request failed");
    }
}

fn render_html(template: &impl Template, status: StatusCode) -> Response {
    match template.render() {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!(error = %e, "template rendering failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

fn error_fragment(err: &TabulaError) -> Response {
    let template = ErrorTemplate {
        message: err.public_message(),
    };
    render_html(&template, status_for(err))
}

fn error_json(state: &AppState, command: &str, err: &TabulaError) -> Response {
    let envelope = ErrorEnvelope::from_error(state.viewer.engine().as_str(), command, err);
    (status_for(err), Json(envelope)).into_response()
}

/// `GET /`
///
/// A listing failure still renders the page, with an empty selector and a notice.
pub async fn index(State(state): State<AppState>) -> Response {
    let (tables, notice) = match state.viewer.list_tables().await {
        Ok(tables) => (tables.iter().map(ToString::to_string).collect(), None),
        Err(e) => {
            log_failure("index", &e);
            (Vec::new(), Some(e.public_message()))
        }
    };

    let template = IndexTemplate {
        title: PAGE_TITLE,
        tables,
        notice,
    };
    render_html(&template, StatusCode::OK)
}

/// `GET /tables`
pub async fn tables(State(state): State<AppState>) -> Response {
    let start = Instant::now();

    match state.viewer.list_tables().await {
        Ok(tables) => {
            let meta = Metadata::new(start.elapsed().as_millis() as u64);
            let envelope = SuccessEnvelope::new(
                state.viewer.engine().as_str(),
                "tables",
                serde_json::json!({ "tables": tables }),
                meta,
            );
            Json(envelope).into_response()
        }
        Err(e) => {
            log_failure("tables", &e);
            error_json(&state, "tables", &e)
        }
    }
}

/// `POST /table/{identifier}`
pub async fn table_fragment(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Response {
    render_fragment(&state, &identifier).await
}

/// `POST /table?q={identifier}`
pub async fn table_fragment_query(
    State(state): State<AppState>,
    Query(params): Query<TableQuery>,
) -> Response {
    render_fragment(&state, &params.q).await
}

async fn render_fragment(state: &AppState, identifier: &str) -> Response {
    match state.viewer.render_table(identifier).await {
        Ok(snapshot) => render_html(&TableTemplate::new(&snapshot), StatusCode::OK),
        Err(e) => {
            log_failure("table", &e);
            error_fragment(&e)
        }
    }
}

/// `GET /api/table/{identifier}`
pub async fn table_json(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Response {
    let start = Instant::now();

    match state.viewer.render_table(&identifier).await {
        Ok(snapshot) => {
            let meta = Metadata::with_rows(
                start.elapsed().as_millis() as u64,
                snapshot.row_count(),
                snapshot.truncated,
            );
            let envelope =
                SuccessEnvelope::new(state.viewer.engine().as_str(), "show", snapshot, meta);
            Json(envelope).into_response()
        }
        Err(e) => {
            log_failure("show", &e);
            error_json(&state, "show", &e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (TabulaError::invalid_identifier("x"), StatusCode::BAD_REQUEST),
            (TabulaError::invalid_input("x"), StatusCode::BAD_REQUEST),
            (TabulaError::connection_failed("x"), StatusCode::BAD_GATEWAY),
            (TabulaError::Timeout(5), StatusCode::GATEWAY_TIMEOUT),
            (TabulaError::query_failed("x"), StatusCode::INTERNAL_SERVER_ERROR),
            (TabulaError::config_error("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }

    #[test]
    fn test_error_fragment_carries_status() {
        let err = TabulaError::connection_failed("Access denied for user 'vr'@'10.0.0.4'");
        let response = error_fragment(&err);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
