//! Metrics provider: the fixed HTTP instruments plus name-keyed custom ones.
//!
//! `MetricsProvider` is the port every consumer records through;
//! `PrometheusProvider` is the registry-backed adapter. Construct one at
//! startup and share it via `Arc`.
//!
//! Recorder methods never fail the caller. A sample that cannot be recorded
//! (bad label arity, label-set drift on a custom metric, NaN value) is
//! logged and dropped so instrumentation never breaks the request it
//! measures.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use meterline_core::sanitize;

use super::process::ProcessCollector;
use super::registry::{Collector, CounterVec, Desc, GaugeVec, HistogramVec, MetricsRegistry, CONTENT_TYPE};
use super::MetricsError;
use crate::config::MetricsSection;

/// Database connection state reported by `database_connection_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbStatus {
    Connected,
    Disconnected,
}

impl DbStatus {
    fn value(self) -> f64 {
        match self {
            DbStatus::Connected => 1.0,
            DbStatus::Disconnected => 0.0,
        }
    }
}

/// Outbound metrics port.
pub trait MetricsProvider: Send + Sync {
    /// `http_requests_total{method,path,status_code}` += 1.
    fn record_http_request(&self, method: &str, path: &str, status: u16);
    /// Observe into `http_request_duration_seconds{method,path}`.
    fn record_http_request_duration(&self, method: &str, path: &str, secs: f64);
    fn increment_http_requests_in_progress(&self, method: &str, path: &str);
    fn decrement_http_requests_in_progress(&self, method: &str, path: &str);
    /// `http_exceptions_total{method,path,exception_type}` += 1.
    fn record_http_exception(&self, method: &str, path: &str, kind: &str);

    /// Set the custom gauge `name`, creating it on first use.
    fn record_custom_metric(&self, name: &str, value: f64, labels: &[(&str, &str)]);
    /// Increment the custom counter `name`, creating it on first use.
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]);
    fn set_gauge(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        self.record_custom_metric(name, value, labels);
    }

    fn record_application_start_time(&self);
    fn record_database_connection_status(&self, status: DbStatus);

    /// Render every instrument in the exposition format.
    fn metrics(&self) -> Result<String, MetricsError>;
    fn content_type(&self) -> &'static str;
    /// Clear all series and drop custom instruments. Test isolation only.
    fn reset(&self);
}

/// Registry-backed provider rendering the Prometheus text format.
pub struct PrometheusProvider {
    registry: MetricsRegistry,

    http_requests_total: Arc<CounterVec>,
    http_request_duration: Arc<HistogramVec>,
    http_requests_in_progress: Arc<GaugeVec>,
    http_exceptions_total: Arc<CounterVec>,

    application_start_time: Arc<GaugeVec>,
    database_connection_status: Arc<GaugeVec>,
    database_name: String,

    custom_gauges: DashMap<String, Arc<GaugeVec>>,
    custom_counters: DashMap<String, Arc<CounterVec>>,
}

impl PrometheusProvider {
    pub fn new(cfg: &MetricsSection) -> Result<Self, MetricsError> {
        let registry = MetricsRegistry::new();
        registry.register(Arc::new(ProcessCollector::new(&cfg.namespace, &cfg.service)))?;

        let http_requests_total = Arc::new(CounterVec::new(
            "http_requests_total",
            "Total number of HTTP requests",
            &["method", "path", "status_code"],
        )?);
        let http_request_duration = Arc::new(HistogramVec::new(
            "http_request_duration_seconds",
            "Duration of HTTP requests in seconds",
            &["method", "path"],
            &cfg.duration_buckets,
        )?);
        let http_requests_in_progress = Arc::new(GaugeVec::new(
            "http_requests_in_progress",
            "Number of HTTP requests currently in progress",
            &["method", "path"],
        )?);
        let http_exceptions_total = Arc::new(CounterVec::new(
            "http_exceptions_total",
            "Total number of HTTP exceptions",
            &["method", "path", "exception_type"],
        )?);
        let application_start_time = Arc::new(GaugeVec::new(
            "application_start_time_seconds",
            "Time when the application started (Unix timestamp)",
            &[],
        )?);
        let database_connection_status = Arc::new(GaugeVec::new(
            "database_connection_status",
            "Database connection status (1 = connected, 0 = disconnected)",
            &["database_name"],
        )?);

        registry.register(http_requests_total.clone())?;
        registry.register(http_request_duration.clone())?;
        registry.register(http_requests_in_progress.clone())?;
        registry.register(http_exceptions_total.clone())?;
        registry.register(application_start_time.clone())?;
        registry.register(database_connection_status.clone())?;

        let provider = Self {
            registry,
            http_requests_total,
            http_request_duration,
            http_requests_in_progress,
            http_exceptions_total,
            application_start_time,
            database_connection_status,
            database_name: cfg.database_name.clone(),
            custom_gauges: DashMap::new(),
            custom_counters: DashMap::new(),
        };

        tracing::info!("prometheus metrics provider initialized");
        provider.record_application_start_time();
        Ok(provider)
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    pub fn http_requests_total(&self) -> &CounterVec {
        &self.http_requests_total
    }

    pub fn http_request_duration(&self) -> &HistogramVec {
        &self.http_request_duration
    }

    pub fn http_requests_in_progress(&self) -> &GaugeVec {
        &self.http_requests_in_progress
    }

    pub fn http_exceptions_total(&self) -> &CounterVec {
        &self.http_exceptions_total
    }

    pub fn application_start_time(&self) -> &GaugeVec {
        &self.application_start_time
    }

    pub fn database_connection_status(&self) -> &GaugeVec {
        &self.database_connection_status
    }

    pub fn custom_gauge(&self, name: &str) -> Option<Arc<GaugeVec>> {
        self.custom_gauges.get(name).map(|g| Arc::clone(g.value()))
    }

    pub fn custom_counter(&self, name: &str) -> Option<Arc<CounterVec>> {
        self.custom_counters.get(name).map(|c| Arc::clone(c.value()))
    }

    fn try_custom_metric(
        &self,
        name: &str,
        value: f64,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        if value.is_nan() {
            return Err(MetricsError::NonFinite(name.to_string()));
        }
        let gauge = get_or_create(&self.custom_gauges, &self.registry, name, |names| {
            GaugeVec::new(&format!("custom_{name}"), &format!("Custom metric: {name}"), names)
        }, labels)?;
        let values = ordered_values(gauge.desc(), labels)?;
        gauge.set(&values, value)
    }

    fn try_increment_counter(
        &self,
        name: &str,
        labels: &[(&str, &str)],
    ) -> Result<(), MetricsError> {
        let counter = get_or_create(&self.custom_counters, &self.registry, name, |names| {
            CounterVec::new(
                &format!("custom_{name}_total"),
                &format!("Custom counter: {name}"),
                names,
            )
        }, labels)?;
        let values = ordered_values(counter.desc(), labels)?;
        counter.inc(&values)
    }

    fn try_reset(&self) -> Result<(), MetricsError> {
        self.registry.reset()?;

        let mut names: Vec<String> = Vec::new();
        names.extend(self.custom_gauges.iter().map(|g| g.value().desc().name().to_string()));
        names.extend(self.custom_counters.iter().map(|c| c.value().desc().name().to_string()));
        self.custom_gauges.clear();
        self.custom_counters.clear();
        for n in &names {
            self.registry.unregister(n)?;
        }
        Ok(())
    }
}

/// Log and drop a failed sample.
fn dropped(op: &'static str, res: Result<(), MetricsError>) {
    if let Err(e) = res {
        tracing::error!(op, error = %e, "metric sample dropped");
    }
}

/// Get the instrument registered under `name`, or create and register it
/// with the label names of this first call.
fn get_or_create<T, F>(
    map: &DashMap<String, Arc<T>>,
    registry: &MetricsRegistry,
    name: &str,
    make: F,
    labels: &[(&str, &str)],
) -> Result<Arc<T>, MetricsError>
where
    T: Collector + 'static,
    F: FnOnce(&[&str]) -> Result<T, MetricsError>,
{
    if let Some(existing) = map.get(name) {
        return Ok(Arc::clone(existing.value()));
    }
    match map.entry(name.to_string()) {
        Entry::Occupied(o) => Ok(Arc::clone(o.get())),
        Entry::Vacant(v) => {
            let names: Vec<&str> = labels.iter().map(|(k, _)| *k).collect();
            let created = Arc::new(make(&names)?);
            registry.register(created.clone())?;
            tracing::debug!(name, labels = ?names, "custom metric created");
            v.insert(Arc::clone(&created));
            Ok(created)
        }
    }
}

/// Reorder `(name, value)` pairs into the instrument's declared label order.
fn ordered_values<'a>(
    desc: &Desc,
    labels: &[(&'a str, &'a str)],
) -> Result<Vec<&'a str>, MetricsError> {
    let declared = desc.label_names();
    let mismatch = || MetricsError::LabelSet {
        metric: desc.name().to_string(),
        expected: declared.to_vec(),
        got: labels.iter().map(|(k, _)| k.to_string()).collect(),
    };
    if labels.len() != declared.len() {
        return Err(mismatch());
    }
    declared
        .iter()
        .map(|n| {
            labels
                .iter()
                .find(|(k, _)| *k == n.as_str())
                .map(|(_, v)| *v)
                .ok_or_else(mismatch)
        })
        .collect()
}

impl MetricsProvider for PrometheusProvider {
    fn record_http_request(&self, method: &str, path: &str, status: u16) {
        let path = sanitize(path);
        let status = status.to_string();
        dropped(
            "http_request",
            self.http_requests_total.inc(&[method, path.as_str(), status.as_str()]),
        );
        tracing::debug!(method, path = %path, status = %status, "recorded http request");
    }

    fn record_http_request_duration(&self, method: &str, path: &str, secs: f64) {
        let path = sanitize(path);
        if secs.is_nan() || secs.is_infinite() {
            dropped("http_duration", Err(MetricsError::NonFinite("http_request_duration_seconds".into())));
            return;
        }
        let secs = if secs < 0.0 {
            tracing::warn!(method, path = %path, secs, "negative request duration clamped to 0");
            0.0
        } else {
            secs
        };
        dropped(
            "http_duration",
            self.http_request_duration.observe(&[method, path.as_str()], secs),
        );
        tracing::debug!(method, path = %path, secs, "recorded http duration");
    }

    fn increment_http_requests_in_progress(&self, method: &str, path: &str) {
        let path = sanitize(path);
        dropped(
            "in_progress_inc",
            self.http_requests_in_progress.inc(&[method, path.as_str()]).map(|_| ()),
        );
    }

    fn decrement_http_requests_in_progress(&self, method: &str, path: &str) {
        let path = sanitize(path);
        match self.http_requests_in_progress.dec(&[method, path.as_str()]) {
            Ok(v) if v < 0.0 => {
                tracing::warn!(method, path = %path, value = v, "in-progress gauge below zero (decrement without increment)");
            }
            Ok(_) => {}
            Err(e) => dropped("in_progress_dec", Err(e)),
        }
    }

    fn record_http_exception(&self, method: &str, path: &str, kind: &str) {
        let path = sanitize(path);
        dropped(
            "http_exception",
            self.http_exceptions_total.inc(&[method, path.as_str(), kind]),
        );
        tracing::debug!(method, path = %path, kind, "recorded http exception");
    }

    fn record_custom_metric(&self, name: &str, value: f64, labels: &[(&str, &str)]) {
        dropped("custom_metric", self.try_custom_metric(name, value, labels));
        tracing::debug!(name, value, "recorded custom metric");
    }

    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        dropped("custom_counter", self.try_increment_counter(name, labels));
        tracing::debug!(name, "incremented counter");
    }

    fn record_application_start_time(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        dropped("start_time", self.application_start_time.set(&[], now));
        tracing::info!(start_time = now, "application start time recorded");
    }

    fn record_database_connection_status(&self, status: DbStatus) {
        dropped(
            "db_status",
            self.database_connection_status
                .set(&[self.database_name.as_str()], status.value()),
        );
        tracing::debug!(?status, database = %self.database_name, "database connection status");
    }

    fn metrics(&self) -> Result<String, MetricsError> {
        self.registry.render().map_err(|e| {
            tracing::error!(error = %e, "failed to render metrics");
            e
        })
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    fn reset(&self) {
        match self.try_reset() {
            Ok(()) => tracing::info!("metrics reset"),
            Err(e) => tracing::error!(error = %e, "metrics reset failed"),
        }
    }
}
