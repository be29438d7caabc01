//! Metrics: registry, provider, process collector and business counters.
//!
//! The registry is dependency-light (atomics + `DashMap`) and renders the
//! Prometheus text format served by the `/metrics` handler. Everything that
//! records a sample goes through [`MetricsProvider`], which never fails the
//! caller: recording errors are logged and the sample is dropped.

pub mod business;
pub mod process;
pub mod provider;
pub mod registry;

use thiserror::Error;

pub use business::BusinessMetrics;
pub use provider::{DbStatus, MetricsProvider, PrometheusProvider};
pub use registry::{CounterVec, GaugeVec, HistogramVec, MetricsRegistry, CONTENT_TYPE};

/// Failure while recording or rendering a metric.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid metric name: {0}")]
    InvalidName(String),
    #[error("invalid label {label:?} on metric {metric}")]
    InvalidLabel { metric: String, label: String },
    #[error("metric {metric} expects {expected} label values, got {got}")]
    LabelArity {
        metric: String,
        expected: usize,
        got: usize,
    },
    #[error("metric {metric} was created with labels {expected:?}, got {got:?}")]
    LabelSet {
        metric: String,
        expected: Vec<String>,
        got: Vec<String>,
    },
    #[error("invalid histogram buckets for {0}")]
    InvalidBuckets(String),
    #[error("metric already registered: {0}")]
    Duplicate(String),
    #[error("non-finite value for {0}")]
    NonFinite(String),
    #[error("metrics registry lock poisoned")]
    Poisoned,
    #[error("render failed: {0}")]
    Render(#[from] std::fmt::Error),
}
