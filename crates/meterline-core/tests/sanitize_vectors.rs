//! Path sanitizer vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use meterline_core::{label_path, method_label, sanitize};


#[test]
fn sanitize_vectors() {
    for v in vector_loader::load("sanitize.json") {
        let got = if v.strip_prefix {
            label_path(&v.input)
        } else {
            sanitize(&v.input)
        };
        assert_eq!(got, v.expect, "vector={}", v.description);
    }
}

#[test]
fn always_leading_slash() {
    let inputs = [
        "", "?", "a", "a/b", "42", "//", "?q=/x", ":id", "../x", "550e8400-e29b-41d4-a716-446655440000",
    ];
    for s in inputs {
        let out = sanitize(s);
        assert!(out.starts_with('/'), "input={s:?} out={out:?}");
    }
}

#[test]
fn sanitize_is_idempotent() {
    for v in vector_loader::load("sanitize.json") {
        let once = sanitize(&v.input);
        assert_eq!(sanitize(&once), once, "vector={}", v.description);
    }
}

#[test]
fn extension_methods_share_one_label() {
    for m in ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"] {
        assert_eq!(method_label(m), m);
    }
    for m in ["M1X", "PROPFIND", "get", ""] {
        assert_eq!(method_label(m), "OTHER", "method={m:?}");
    }
}
