//! meterline server library entry.
//!
//! Wires config, the metrics provider, request instrumentation and the
//! account API into one axum stack. Consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod account;
pub mod api;
pub mod app_state;
pub mod config;
pub mod middleware;
pub mod obs;
pub mod ops;
pub mod router;
