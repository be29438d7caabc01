//! Outermost error boundary and the exception telemetry hook.
//!
//! Every failure that escapes routing ends up here: error responses carrying
//! an [`ErrorReport`], handler panics, and requests no route matched.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;

use meterline_core::sanitize::UNMATCHED_PATH;
use meterline_core::{classify, label_path, method_label, AppError, ErrorReport};

use crate::api::ApiError;
use crate::app_state::AppState;
use crate::obs::MetricsProvider;

/// Per-request flag set once the failure has been counted as an exception.
#[derive(Debug, Clone, Default)]
pub struct ExceptionSlot(Arc<AtomicBool>);

impl ExceptionSlot {
    pub fn mark(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_marked(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Response marker set by the router fallback.
#[derive(Debug, Clone, Copy)]
pub struct Unmatched;

/// Records exception counts for failures the interceptor never saw.
///
/// Recording must never disturb the error path, so a failing provider is
/// logged and ignored.
#[derive(Clone, Default)]
pub struct ExceptionTelemetryHook {
    provider: Option<Arc<dyn MetricsProvider>>,
}

impl ExceptionTelemetryHook {
    pub fn new(provider: Option<Arc<dyn MetricsProvider>>) -> Self {
        Self { provider }
    }

    /// `path` is the raw request path; it is stripped and sanitized here.
    pub fn record(&self, method: &str, path: &str, kind: &str) {
        let Some(provider) = &self.provider else {
            return;
        };
        let path = label_path(path);
        let res = std::panic::catch_unwind(AssertUnwindSafe(|| {
            provider.record_http_exception(method, &path, kind)
        }));
        match res {
            Ok(()) => tracing::debug!(method, path = %path, kind, "exception metric recorded"),
            Err(_) => tracing::warn!(method, path = %path, kind, "failed to record exception metric"),
        }
    }
}

fn log_report(method: &str, path: &str, report: &ErrorReport) {
    if report.status >= 500 {
        tracing::error!(
            method,
            path,
            status = report.status,
            kind = %report.kind,
            message = %report.message,
            "request failed"
        );
    } else {
        tracing::info!(
            method,
            path,
            status = report.status,
            kind = %report.kind,
            "request rejected"
        );
    }
}

pub async fn error_boundary(State(app): State<AppState>, mut req: Request, next: Next) -> Response {
    let method = method_label(req.method().as_str()).to_string();
    let path = req.uri().path().to_string();
    let slot = ExceptionSlot::default();
    req.extensions_mut().insert(slot.clone());

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(resp) => {
            if let Some(report) = resp.extensions().get::<ErrorReport>() {
                log_report(&method, &path, report);
                if !slot.is_marked() {
                    // Unrouted paths are caller-chosen; keep them out of labels.
                    let label = if resp.extensions().get::<Unmatched>().is_some() {
                        UNMATCHED_PATH
                    } else {
                        path.as_str()
                    };
                    app.exception_hook().record(&method, label, &report.kind);
                }
            }
            resp
        }
        Err(panic) => {
            let message = classify::panic_message(&*panic).unwrap_or("non-string panic payload");
            tracing::error!(method = %method, path = %path, panic = message, "handler panicked");
            if !slot.is_marked() {
                app.exception_hook()
                    .record(&method, &path, classify::classify_panic(&*panic));
            }
            ApiError(AppError::Internal("Internal server error".into())).into_response()
        }
    }
}
