//! In-process metrics registry with Prometheus text exposition.
//!
//! Counter/gauge/histogram vectors keep one series per label-value tuple in a
//! `DashMap`, each series an atomic cell, so recording from many tasks never
//! loses an update and never blocks rendering for long. Label names are fixed
//! per instrument; values are supplied positionally and arity-checked.

use std::fmt::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use dashmap::DashMap;

use super::MetricsError;

/// Content type of the rendered exposition.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_help(v: &str) -> String {
    v.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Prometheus float formatting (`+Inf`, `-Inf`, `NaN`).
pub(crate) fn format_value(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_string()
    } else if v == f64::INFINITY {
        "+Inf".to_string()
    } else if v == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        v.to_string()
    }
}

pub(crate) fn valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Name, help and label schema shared by every instrument kind.
#[derive(Debug, Clone)]
pub struct Desc {
    name: String,
    help: String,
    label_names: Vec<String>,
}

impl Desc {
    fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self, MetricsError> {
        if !valid_metric_name(name) {
            return Err(MetricsError::InvalidName(name.to_string()));
        }
        let mut seen: Vec<&str> = Vec::with_capacity(label_names.len());
        for l in label_names {
            if !valid_label_name(l) || seen.contains(l) {
                return Err(MetricsError::InvalidLabel {
                    metric: name.to_string(),
                    label: l.to_string(),
                });
            }
            seen.push(*l);
        }
        Ok(Self {
            name: name.to_string(),
            help: help.to_string(),
            label_names: label_names.iter().map(|s| s.to_string()).collect(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    fn key(&self, values: &[&str]) -> Result<Vec<String>, MetricsError> {
        if values.len() != self.label_names.len() {
            return Err(MetricsError::LabelArity {
                metric: self.name.clone(),
                expected: self.label_names.len(),
                got: values.len(),
            });
        }
        Ok(values.iter().map(|v| v.to_string()).collect())
    }

    fn header(&self, kind: &str, out: &mut String) -> fmt::Result {
        writeln!(out, "# HELP {} {}", self.name, escape_help(&self.help))?;
        writeln!(out, "# TYPE {} {}", self.name, kind)
    }

    /// `a="x",b="y"` for one series (no braces).
    fn label_pairs(&self, values: &[String]) -> String {
        self.label_names
            .iter()
            .zip(values)
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Something the registry can render and reset.
pub trait Collector: Send + Sync {
    fn name(&self) -> &str;
    fn encode(&self, out: &mut String) -> fmt::Result;
    fn reset(&self);
}

/// `f64` stored as bits in an `AtomicU64`.
#[derive(Debug, Default)]
pub struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    /// Add `delta` and return the new value.
    pub fn add(&self, delta: f64) -> f64 {
        let mut cur = self.0.load(Ordering::Relaxed);
        loop {
            let next = f64::from_bits(cur) + delta;
            match self.0.compare_exchange_weak(
                cur,
                next.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return next,
                Err(actual) => cur = actual,
            }
        }
    }
}

fn sorted_keys<V>(map: &DashMap<Vec<String>, V>) -> Vec<Vec<String>> {
    let mut keys: Vec<Vec<String>> = map.iter().map(|r| r.key().clone()).collect();
    keys.sort();
    keys
}

/// Monotonic counter partitioned by labels.
#[derive(Debug)]
pub struct CounterVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicU64>,
}

impl CounterVec {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self, MetricsError> {
        Ok(Self {
            desc: Desc::new(name, help, label_names)?,
            map: DashMap::new(),
        })
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    /// Increment by 1.
    pub fn inc(&self, values: &[&str]) -> Result<(), MetricsError> {
        self.add(values, 1)
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, values: &[&str], v: u64) -> Result<(), MetricsError> {
        let key = self.desc.key(values)?;
        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
        Ok(())
    }

    /// Current value of one series (`None` if never observed).
    pub fn get(&self, values: &[&str]) -> Option<u64> {
        let key = self.desc.key(values).ok()?;
        self.map.get(&key).map(|c| c.load(Ordering::Relaxed))
    }

    pub fn series_count(&self) -> usize {
        self.map.len()
    }
}

impl Collector for CounterVec {
    fn name(&self) -> &str {
        self.desc.name()
    }

    fn encode(&self, out: &mut String) -> fmt::Result {
        self.desc.header("counter", out)?;
        for key in sorted_keys(&self.map) {
            let Some(val) = self.map.get(&key).map(|c| c.load(Ordering::Relaxed)) else {
                continue;
            };
            let labels = self.desc.label_pairs(&key);
            if labels.is_empty() {
                writeln!(out, "{} {}", self.desc.name, val)?;
            } else {
                writeln!(out, "{}{{{}}} {}", self.desc.name, labels, val)?;
            }
        }
        Ok(())
    }

    fn reset(&self) {
        self.map.clear();
    }
}

/// Gauge partitioned by labels; moves in either direction.
#[derive(Debug)]
pub struct GaugeVec {
    desc: Desc,
    map: DashMap<Vec<String>, AtomicF64>,
}

impl GaugeVec {
    pub fn new(name: &str, help: &str, label_names: &[&str]) -> Result<Self, MetricsError> {
        Ok(Self {
            desc: Desc::new(name, help, label_names)?,
            map: DashMap::new(),
        })
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    /// Increment by 1 and return the new value.
    pub fn inc(&self, values: &[&str]) -> Result<f64, MetricsError> {
        self.add(values, 1.0)
    }

    /// Decrement by 1 and return the new value.
    pub fn dec(&self, values: &[&str]) -> Result<f64, MetricsError> {
        self.add(values, -1.0)
    }

    /// Add an arbitrary signed delta and return the new value.
    pub fn add(&self, values: &[&str], v: f64) -> Result<f64, MetricsError> {
        let key = self.desc.key(values)?;
        let gauge = self.map.entry(key).or_insert_with(|| AtomicF64::new(0.0));
        Ok(gauge.add(v))
    }

    pub fn set(&self, values: &[&str], v: f64) -> Result<(), MetricsError> {
        let key = self.desc.key(values)?;
        self.map
            .entry(key)
            .or_insert_with(|| AtomicF64::new(0.0))
            .set(v);
        Ok(())
    }

    pub fn get(&self, values: &[&str]) -> Option<f64> {
        let key = self.desc.key(values).ok()?;
        self.map.get(&key).map(|g| g.get())
    }

    pub fn series_count(&self) -> usize {
        self.map.len()
    }
}

impl Collector for GaugeVec {
    fn name(&self) -> &str {
        self.desc.name()
    }

    fn encode(&self, out: &mut String) -> fmt::Result {
        self.desc.header("gauge", out)?;
        for key in sorted_keys(&self.map) {
            let Some(val) = self.map.get(&key).map(|g| g.get()) else {
                continue;
            };
            let labels = self.desc.label_pairs(&key);
            if labels.is_empty() {
                writeln!(out, "{} {}", self.desc.name, format_value(val))?;
            } else {
                writeln!(out, "{}{{{}}} {}", self.desc.name, labels, format_value(val))?;
            }
        }
        Ok(())
    }

    fn reset(&self) {
        self.map.clear();
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicF64,
    // Non-cumulative per-bucket counts; cumulated at render time.
    buckets: Vec<AtomicU64>,
}

impl AtomicHistogram {
    fn new(n: usize) -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicF64::new(0.0),
            buckets: (0..n).map(|_| AtomicU64::new(0)).collect(),
        }
    }
}

/// Snapshot of one histogram series.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    /// Cumulative counts, one per upper bound (excluding `+Inf`).
    pub cumulative: Vec<u64>,
}

/// Histogram with fixed upper bounds (seconds) partitioned by labels.
pub struct HistogramVec {
    desc: Desc,
    bounds: Vec<f64>,
    map: DashMap<Vec<String>, AtomicHistogram>,
}

impl HistogramVec {
    pub fn new(
        name: &str,
        help: &str,
        label_names: &[&str],
        bounds: &[f64],
    ) -> Result<Self, MetricsError> {
        if label_names.contains(&"le") {
            return Err(MetricsError::InvalidLabel {
                metric: name.to_string(),
                label: "le".to_string(),
            });
        }
        let increasing = bounds.windows(2).all(|w| w[0] < w[1]);
        if bounds.is_empty() || !increasing || bounds.iter().any(|b| !b.is_finite()) {
            return Err(MetricsError::InvalidBuckets(name.to_string()));
        }
        Ok(Self {
            desc: Desc::new(name, help, label_names)?,
            bounds: bounds.to_vec(),
            map: DashMap::new(),
        })
    }

    pub fn desc(&self) -> &Desc {
        &self.desc
    }

    pub fn bounds(&self) -> &[f64] {
        &self.bounds
    }

    /// Observe one sample.
    pub fn observe(&self, values: &[&str], v: f64) -> Result<(), MetricsError> {
        let key = self.desc.key(values)?;
        let n = self.bounds.len();
        let hist = self.map.entry(key).or_insert_with(|| AtomicHistogram::new(n));

        if let Some(i) = self.bounds.iter().position(|b| v <= *b) {
            hist.buckets[i].fetch_add(1, Ordering::Relaxed);
        }
        hist.sum.add(v);
        hist.count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn snapshot(&self, values: &[&str]) -> Option<HistogramSnapshot> {
        let key = self.desc.key(values).ok()?;
        let hist = self.map.get(&key)?;
        Some(Self::snapshot_of(&hist))
    }

    fn snapshot_of(hist: &AtomicHistogram) -> HistogramSnapshot {
        let mut acc = 0;
        let cumulative = hist
            .buckets
            .iter()
            .map(|b| {
                acc += b.load(Ordering::Relaxed);
                acc
            })
            .collect();
        HistogramSnapshot {
            count: hist.count.load(Ordering::Relaxed),
            sum: hist.sum.get(),
            cumulative,
        }
    }

    pub fn series_count(&self) -> usize {
        self.map.len()
    }
}

impl Collector for HistogramVec {
    fn name(&self) -> &str {
        self.desc.name()
    }

    fn encode(&self, out: &mut String) -> fmt::Result {
        self.desc.header("histogram", out)?;
        let name = &self.desc.name;
        for key in sorted_keys(&self.map) {
            let Some(snap) = self.map.get(&key).map(|h| Self::snapshot_of(&h)) else {
                continue;
            };
            let label_str = self.desc.label_pairs(&key);
            let prefix = if label_str.is_empty() {
                String::new()
            } else {
                format!("{},", label_str)
            };

            for (le, count) in self.bounds.iter().zip(&snap.cumulative) {
                writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, format_value(*le), count)?;
            }
            // +Inf must equal _count even if a sample raced in between loads.
            let inf = snap.count.max(snap.cumulative.last().copied().unwrap_or(0));
            writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, inf)?;

            if label_str.is_empty() {
                writeln!(out, "{}_sum {}", name, format_value(snap.sum))?;
                writeln!(out, "{}_count {}", name, inf)?;
            } else {
                writeln!(out, "{}_sum{{{}}} {}", name, label_str, format_value(snap.sum))?;
                writeln!(out, "{}_count{{{}}} {}", name, label_str, inf)?;
            }
        }
        Ok(())
    }

    fn reset(&self) {
        self.map.clear();
    }
}

/// Ordered set of collectors rendered together.
#[derive(Default)]
pub struct MetricsRegistry {
    collectors: RwLock<Vec<Arc<dyn Collector>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collector. Names must be unique.
    pub fn register(&self, c: Arc<dyn Collector>) -> Result<(), MetricsError> {
        let mut g = self.collectors.write().map_err(|_| MetricsError::Poisoned)?;
        if g.iter().any(|e| e.name() == c.name()) {
            return Err(MetricsError::Duplicate(c.name().to_string()));
        }
        g.push(c);
        Ok(())
    }

    /// Remove a collector by name. Returns whether one was removed.
    pub fn unregister(&self, name: &str) -> Result<bool, MetricsError> {
        let mut g = self.collectors.write().map_err(|_| MetricsError::Poisoned)?;
        let before = g.len();
        g.retain(|c| c.name() != name);
        Ok(g.len() != before)
    }

    pub fn names(&self) -> Result<Vec<String>, MetricsError> {
        let g = self.collectors.read().map_err(|_| MetricsError::Poisoned)?;
        Ok(g.iter().map(|c| c.name().to_string()).collect())
    }

    /// Clear every series of every collector.
    pub fn reset(&self) -> Result<(), MetricsError> {
        let g = self.collectors.read().map_err(|_| MetricsError::Poisoned)?;
        for c in g.iter() {
            c.reset();
        }
        Ok(())
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self) -> Result<String, MetricsError> {
        // Clone the list so encoding never holds the lock.
        let collectors: Vec<Arc<dyn Collector>> = {
            let g = self.collectors.read().map_err(|_| MetricsError::Poisoned)?;
            g.clone()
        };
        let mut out = String::new();
        for c in collectors {
            c.encode(&mut out)?;
        }
        Ok(out)
    }
}
