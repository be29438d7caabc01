//! Error classification tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use meterline_core::classify::{
    classify_message, classify_panic, failure_status, UNKNOWN_ERROR,
};
use meterline_core::{AppError, ClientCode};

#[test]
fn variant_status_and_kind() {
    let e = AppError::NotFound("Account not found".into());
    assert_eq!(e.status(), 404);
    assert_eq!(e.kind(), "NotFoundError");
    assert_eq!(e.client_code(), ClientCode::NotFound);
    assert_eq!(e.to_string(), "Account not found");

    let e = AppError::AlreadyExists("account".into());
    assert_eq!(e.status(), 409);
    assert_eq!(e.client_code().as_str(), "CONFLICT");

    let e = AppError::Timeout { message: "db".into(), status: None };
    assert_eq!(e.status(), 408);
    assert_eq!(e.kind(), "TimeoutError");
}

#[test]
fn explicit_status_wins() {
    let e = AppError::ExternalService { message: "psp down".into(), status: Some(502) };
    let r = e.report();
    assert_eq!(r.explicit_status, Some(502));
    assert_eq!(failure_status(Some(&r), Some(200)), 502);

    let e = AppError::ExternalService { message: "psp down".into(), status: None };
    assert_eq!(failure_status(Some(&e.report()), Some(200)), 500);
}

#[test]
fn status_chain_without_report() {
    assert_eq!(failure_status(None, Some(418)), 418);
    assert_eq!(failure_status(None, Some(200)), 500);
    assert_eq!(failure_status(None, None), 500);
}

#[test]
fn internal_messages_are_sniffed() {
    assert_eq!(AppError::Internal("upstream timeout".into()).kind(), "TimeoutError");
    assert_eq!(AppError::Internal("Validation of row failed".into()).kind(), "ValidationError");
    assert_eq!(AppError::Internal("user unauthorized".into()).kind(), "AuthorizationError");
    assert_eq!(AppError::Internal("row not found".into()).kind(), "NotFoundError");
    assert_eq!(AppError::Internal("disk full".into()).kind(), UNKNOWN_ERROR);
    assert_eq!(classify_message("missing authorization header"), "AuthorizationError");
}

#[test]
fn panic_payloads() {
    let p: Box<dyn std::any::Any + Send> = Box::new("request timed out");
    assert_eq!(classify_panic(p.as_ref()), "TimeoutError");
    let p: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
    assert_eq!(classify_panic(p.as_ref()), UNKNOWN_ERROR);
    let p: Box<dyn std::any::Any + Send> = Box::new(7_u32);
    assert_eq!(classify_panic(p.as_ref()), UNKNOWN_ERROR);
}
