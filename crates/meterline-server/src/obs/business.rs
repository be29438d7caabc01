//! Business-level counters recorded by domain services.
//!
//! Thin pass-through onto the provider's custom counter/gauge API. With no
//! provider bound every call is a no-op.

use std::sync::Arc;

use super::MetricsProvider;

#[derive(Clone, Default)]
pub struct BusinessMetrics {
    provider: Option<Arc<dyn MetricsProvider>>,
}

impl BusinessMetrics {
    pub fn new(provider: Option<Arc<dyn MetricsProvider>>) -> Self {
        Self { provider }
    }

    fn with(&self, f: impl FnOnce(&dyn MetricsProvider)) {
        if let Some(p) = &self.provider {
            f(p.as_ref());
        }
    }

    pub fn record_account_creation(&self) {
        self.with(|p| p.increment_counter("account_created", &[("operation", "create")]));
        tracing::debug!("recorded account creation");
    }

    pub fn record_account_update(&self) {
        self.with(|p| p.increment_counter("account_updated", &[("operation", "update")]));
        tracing::debug!("recorded account update");
    }

    pub fn record_account_deletion(&self) {
        self.with(|p| p.increment_counter("account_deleted", &[("operation", "delete")]));
        tracing::debug!("recorded account deletion");
    }

    pub fn record_account_query(&self) {
        self.with(|p| p.increment_counter("account_queried", &[("operation", "read")]));
        tracing::debug!("recorded account query");
    }

    /// Latest duration per operation plus an operation counter.
    pub fn record_database_operation(&self, operation: &str, secs: f64) {
        self.with(|p| {
            p.record_custom_metric(
                "database_operation_duration_seconds",
                secs,
                &[("operation", operation)],
            );
            p.increment_counter("database_operations", &[("operation", operation)]);
        });
        tracing::debug!(operation, secs, "recorded database operation");
    }

    pub fn record_business_validation_error(&self, error_type: &str) {
        self.with(|p| {
            p.increment_counter("business_validation_errors", &[("error_type", error_type)])
        });
        tracing::debug!(error_type, "recorded business validation error");
    }

    pub fn set_active_users_count(&self, count: u64) {
        self.with(|p| p.set_gauge("active_users_count", count as f64, &[]));
    }

    /// Exported as `custom_event_<event>_total`.
    pub fn record_custom_event(&self, event: &str, labels: &[(&str, &str)]) {
        self.with(|p| p.increment_counter(&format!("event_{event}"), labels));
        tracing::debug!(event, "recorded custom event");
    }
}
