//! `AppError` -> HTTP response mapping.
//!
//! The response carries the error's [`ErrorReport`] in its extensions so the
//! request instrumentation and the error boundary classify the failure from
//! the variant, not from the body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;

use meterline_core::{AppError, ErrorReport};

/// Handler error type.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report: ErrorReport = self.0.report();
        let status =
            StatusCode::from_u16(report.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "statusCode": status.as_u16(),
            "error": self.0.client_code(),
            "message": &report.message,
            "timestamp": Utc::now().to_rfc3339(),
        }));
        let mut resp = (status, body).into_response();
        resp.extensions_mut().insert(report);
        resp
    }
}
