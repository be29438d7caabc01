//! meterline core: transport-agnostic primitives shared by the HTTP server.
//!
//! This crate defines the closed application error set, the path sanitizer
//! used to keep metric label cardinality bounded, and the rules that turn a
//! failed request into a `(status, exception kind)` pair. It intentionally
//! carries no HTTP or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! All fallible paths surface as `AppError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod classify;
pub mod error;
pub mod sanitize;

/// Shared result type.
pub use error::{AppError, ClientCode, ErrorReport, Result};
pub use sanitize::{label_path, method_label, sanitize, strip_api_prefix};
