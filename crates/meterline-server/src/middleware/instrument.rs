//! Request instrumentation interceptor.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use futures_util::FutureExt;

use meterline_core::{classify, label_path, method_label, ErrorReport};

use super::boundary::ExceptionSlot;
use crate::app_state::AppState;
use crate::obs::MetricsProvider;

/// What the interceptor knows about a request before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestSample {
    pub method: String,
    /// Sanitized, prefix-stripped route label.
    pub path: String,
    pub started: Instant,
}

/// Matched route template when available, else the raw URI path.
pub fn route_path(req: &Request) -> &str {
    req.extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str())
        .unwrap_or_else(|| req.uri().path())
}

impl RequestSample {
    pub fn from_request(req: &Request) -> Self {
        Self {
            method: method_label(req.method().as_str()).to_string(),
            path: label_path(route_path(req)),
            started: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}

/// In-progress gauge guard. The matching decrement runs on drop, so it fires
/// exactly once whether the handler returns, fails or unwinds.
struct InFlight {
    provider: Arc<dyn MetricsProvider>,
    method: String,
    path: String,
}

impl InFlight {
    fn enter(provider: Arc<dyn MetricsProvider>, sample: &RequestSample) -> Self {
        provider.increment_http_requests_in_progress(&sample.method, &sample.path);
        Self {
            provider,
            method: sample.method.clone(),
            path: sample.path.clone(),
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.provider
            .decrement_http_requests_in_progress(&self.method, &self.path);
        tracing::debug!(method = %self.method, path = %self.path, "request tracking finalized");
    }
}

/// Connection upgrades (WebSocket and friends) are not plain HTTP exchanges.
pub fn is_upgrade(req: &Request) -> bool {
    req.headers().contains_key(header::UPGRADE)
}

fn record_failure(
    provider: &dyn MetricsProvider,
    sample: &RequestSample,
    status: u16,
    kind: &str,
    secs: f64,
) {
    provider.record_http_request(&sample.method, &sample.path, status);
    provider.record_http_request_duration(&sample.method, &sample.path, secs);
    provider.record_http_exception(&sample.method, &sample.path, kind);
    tracing::debug!(
        method = %sample.method,
        path = %sample.path,
        status,
        kind,
        secs,
        "request failed"
    );
}

pub async fn track_request(State(app): State<AppState>, req: Request, next: Next) -> Response {
    let Some(provider) = app.metrics() else {
        return next.run(req).await;
    };
    if is_upgrade(&req) {
        return next.run(req).await;
    }

    // Compared before sanitizing: labels drop the API prefix and ids.
    if app.is_ops_path(route_path(&req)) || app.is_ops_path(req.uri().path()) {
        return next.run(req).await;
    }

    let sample = RequestSample::from_request(&req);

    let slot = req.extensions().get::<ExceptionSlot>().cloned();
    let _in_flight = InFlight::enter(Arc::clone(&provider), &sample);

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(resp) => {
            let secs = sample.elapsed_secs();
            match resp.extensions().get::<ErrorReport>() {
                None => {
                    let status = resp.status().as_u16();
                    provider.record_http_request(&sample.method, &sample.path, status);
                    provider.record_http_request_duration(&sample.method, &sample.path, secs);
                    tracing::debug!(
                        method = %sample.method,
                        path = %sample.path,
                        status,
                        secs,
                        "request completed"
                    );
                }
                Some(report) => {
                    let status =
                        classify::failure_status(Some(report), Some(resp.status().as_u16()));
                    record_failure(provider.as_ref(), &sample, status, &report.kind, secs);
                    if let Some(slot) = &slot {
                        slot.mark();
                    }
                }
            }
            resp
        }
        Err(panic) => {
            let secs = sample.elapsed_secs();
            let status = classify::failure_status(None, None);
            let kind = classify::classify_panic(&*panic);
            record_failure(provider.as_ref(), &sample, status, kind, secs);
            if let Some(slot) = &slot {
                slot.mark();
            }
            std::panic::resume_unwind(panic)
        }
    }
}
