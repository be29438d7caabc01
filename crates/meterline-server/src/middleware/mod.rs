//! HTTP middleware: per-request instrumentation and the outer error boundary.
//!
//! Layer order (outermost first):
//! 1. [`boundary::error_boundary`] wraps everything, including unrouted requests.
//! 2. [`instrument::track_request`] is a route layer, so it only sees matched routes.
//!
//! A failure observed by the interceptor marks the request's
//! [`boundary::ExceptionSlot`]; the boundary's hook then skips it.

pub mod boundary;
pub mod instrument;

pub use boundary::{error_boundary, ExceptionSlot, ExceptionTelemetryHook, Unmatched};
pub use instrument::{route_path, track_request, RequestSample};
