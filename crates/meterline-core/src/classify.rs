//! Failure classification for request instrumentation.
//!
//! Status resolution order for a failed request:
//! 1. status carried by the error value,
//! 2. status mapped from the error variant,
//! 3. the response status, when it is not the default `200`,
//! 4. `500`.
//!
//! Exception kinds come from the error variant. Errors that arrive without
//! a variant (panic payloads, opaque internal messages) are sniffed for
//! keywords and otherwise reported as `UnknownError`.

use std::any::Any;

use crate::error::{ClientCode, ErrorReport};

/// Fallback exception kind.
pub const UNKNOWN_ERROR: &str = "UnknownError";

const DEFAULT_SUCCESS_STATUS: u16 = 200;
const INTERNAL_ERROR_STATUS: u16 = 500;

/// Resolve the status to record for a failed request.
pub fn failure_status(report: Option<&ErrorReport>, response_status: Option<u16>) -> u16 {
    if let Some(r) = report {
        if let Some(s) = r.explicit_status {
            return s;
        }
        return r.status;
    }
    match response_status {
        Some(s) if s != DEFAULT_SUCCESS_STATUS => s,
        _ => INTERNAL_ERROR_STATUS,
    }
}

/// Keyword sniffing over a free-form error message.
pub fn classify_message(msg: &str) -> &'static str {
    let m = msg.to_ascii_lowercase();
    if m.contains("timeout") || m.contains("timed out") {
        return "TimeoutError";
    }
    if m.contains("validation") {
        return "ValidationError";
    }
    if m.contains("authorization") || m.contains("unauthorized") {
        return "AuthorizationError";
    }
    if m.contains("not found") {
        return "NotFoundError";
    }
    UNKNOWN_ERROR
}

/// Extract the message of a panic payload (`&str` or `String`).
pub fn panic_message(payload: &(dyn Any + Send)) -> Option<&str> {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        return Some(s);
    }
    payload.downcast_ref::<String>().map(String::as_str)
}

/// Exception kind for a caught panic.
pub fn classify_panic(payload: &(dyn Any + Send)) -> &'static str {
    panic_message(payload)
        .map(classify_message)
        .unwrap_or(UNKNOWN_ERROR)
}

/// Client code for an arbitrary HTTP status.
pub fn client_code_for_status(status: u16) -> ClientCode {
    match status {
        401 | 403 => ClientCode::Unauthorized,
        404 => ClientCode::NotFound,
        408 | 504 => ClientCode::Timeout,
        409 => ClientCode::Conflict,
        501 => ClientCode::NotImplemented,
        502 | 503 => ClientCode::Upstream,
        400..=499 => ClientCode::BadRequest,
        _ => ClientCode::Internal,
    }
}
