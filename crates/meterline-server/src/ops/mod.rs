//! Operational HTTP endpoints.
//!
//! - `metrics.path` (default `/metrics`): Prometheus text format
//! - `metrics.health_path` (default `/health`): liveness with uptime and RSS

use axum::{
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use meterline_core::AppError;

use crate::api::ApiError;
use crate::app_state::AppState;
use crate::middleware::Unmatched;
use crate::obs::process::rss_bytes;

pub async fn metrics(State(state): State<AppState>) -> Response {
    let Some(provider) = state.metrics() else {
        return ApiError(AppError::NotFound("metrics disabled".into())).into_response();
    };

    match provider.metrics() {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, provider.content_type()),
                (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
                (header::PRAGMA, "no-cache"),
                (header::EXPIRES, "0"),
            ],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "metrics exposition failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "metrics unavailable",
            )
                .into_response()
        }
    }
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let provider = if state.metrics().is_some() {
        "prometheus"
    } else {
        "disabled"
    };
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.uptime().as_secs_f64(),
        "memory": { "rss_bytes": rss_bytes() },
        "metrics_provider": provider,
    }))
}

/// Router fallback for unmatched routes.
pub async fn not_found(method: Method, uri: Uri) -> Response {
    let mut resp =
        ApiError(AppError::NotFound(format!("Cannot {} {}", method, uri.path()))).into_response();
    resp.extensions_mut().insert(Unmatched);
    resp
}
