//! Shared application state.
//!
//! Startup errors are returned as `Result` so `main` can report them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use meterline_core::error::{AppError, Result};

use crate::account::{AccountRepository, AccountService, InMemoryAccountRepository};
use crate::config::AppConfig;
use crate::middleware::ExceptionTelemetryHook;
use crate::obs::{BusinessMetrics, DbStatus, MetricsProvider, PrometheusProvider};

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    cfg: AppConfig,
    metrics: Option<Arc<dyn MetricsProvider>>,
    hook: ExceptionTelemetryHook,
    accounts: AccountService,
    started: Instant,
}

impl AppState {
    /// Build state from config: a Prometheus provider when metrics are
    /// enabled, and an in-memory account store.
    pub fn new(cfg: AppConfig) -> Result<Self> {
        let metrics: Option<Arc<dyn MetricsProvider>> = if cfg.metrics.enabled {
            let provider = PrometheusProvider::new(&cfg.metrics)
                .map_err(|e| AppError::Config(format!("metrics provider init failed: {e}")))?;
            Some(Arc::new(provider))
        } else {
            tracing::info!("metrics disabled");
            None
        };
        Ok(Self::with_parts(
            cfg,
            metrics,
            Arc::new(InMemoryAccountRepository::new()),
        ))
    }

    /// Wire explicit parts. Tests use this to keep a handle on the provider.
    pub fn with_parts(
        cfg: AppConfig,
        metrics: Option<Arc<dyn MetricsProvider>>,
        repo: Arc<dyn AccountRepository>,
    ) -> Self {
        if let Some(m) = &metrics {
            m.record_database_connection_status(DbStatus::Connected);
        }
        let accounts = AccountService::new(repo, BusinessMetrics::new(metrics.clone()));
        let hook = ExceptionTelemetryHook::new(metrics.clone());
        Self {
            inner: Arc::new(AppStateInner {
                cfg,
                metrics,
                hook,
                accounts,
                started: Instant::now(),
            }),
        }
    }

    pub fn cfg(&self) -> &AppConfig {
        &self.inner.cfg
    }

    pub fn metrics(&self) -> Option<Arc<dyn MetricsProvider>> {
        self.inner.metrics.clone()
    }

    pub fn exception_hook(&self) -> &ExceptionTelemetryHook {
        &self.inner.hook
    }

    pub fn accounts(&self) -> &AccountService {
        &self.inner.accounts
    }

    pub fn uptime(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// True for the exposition and health routes, which are never measured.
    pub fn is_ops_path(&self, path: &str) -> bool {
        let m = &self.inner.cfg.metrics;
        path == m.path || path == m.health_path
    }
}
