use std::net::SocketAddr;

use serde::Deserialize;
use meterline_core::error::{AppError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(AppError::Config(format!(
                "unsupported config version {} (expected 1)",
                self.version
            )));
        }

        self.server.validate()?;
        self.metrics.validate()?;

        let prefix = self.server.api_prefix.as_str();
        if !prefix.is_empty() {
            for p in [&self.metrics.path, &self.metrics.health_path] {
                if p.starts_with(prefix) {
                    return Err(AppError::Config(format!(
                        "ops path {p} must not live under server.api_prefix"
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            api_prefix: default_api_prefix(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;
        let p = &self.api_prefix;
        if !p.is_empty() && (!p.starts_with('/') || p.ends_with('/')) {
            return Err(AppError::Config(
                "server.api_prefix must be empty or start with '/' and not end with '/'".into(),
            ));
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|_| {
            AppError::Config(format!("server.listen must be a valid SocketAddr: {}", self.listen))
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_metrics_path")]
    pub path: String,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_service")]
    pub service: String,

    #[serde(default = "default_database_name")]
    pub database_name: String,

    #[serde(default = "default_duration_buckets")]
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_metrics_path(),
            health_path: default_health_path(),
            namespace: default_namespace(),
            service: default_service(),
            database_name: default_database_name(),
            duration_buckets: default_duration_buckets(),
        }
    }
}

impl MetricsSection {
    pub fn validate(&self) -> Result<()> {
        for (key, p) in [("metrics.path", &self.path), ("metrics.health_path", &self.health_path)] {
            if !p.starts_with('/') || p.len() < 2 {
                return Err(AppError::Config(format!("{key} must start with '/' and name a route")));
            }
        }
        if self.path == self.health_path {
            return Err(AppError::Config(
                "metrics.path and metrics.health_path must differ".into(),
            ));
        }
        let ns_ok = self
            .namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !self.namespace.starts_with(|c: char| c.is_ascii_digit());
        if !ns_ok {
            return Err(AppError::Config(
                "metrics.namespace may only contain [a-zA-Z0-9_] and must not start with a digit".into(),
            ));
        }
        let b = &self.duration_buckets;
        if b.is_empty()
            || b.iter().any(|v| !v.is_finite())
            || !b.windows(2).all(|w| w[0] < w[1])
        {
            return Err(AppError::Config(
                "metrics.duration_buckets must be non-empty, finite and strictly increasing".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:3000".into()
}
fn default_api_prefix() -> String {
    "/api/v1".into()
}
fn default_enabled() -> bool {
    true
}
fn default_metrics_path() -> String {
    "/metrics".into()
}
fn default_health_path() -> String {
    "/health".into()
}
fn default_namespace() -> String {
    "meterline_".into()
}
fn default_service() -> String {
    "meterline-api".into()
}
fn default_database_name() -> String {
    "meterline-db".into()
}
fn default_duration_buckets() -> Vec<f64> {
    vec![0.001, 0.005, 0.015, 0.05, 0.1, 0.2, 0.3, 0.4, 0.5, 1.0, 2.0, 5.0]
}
