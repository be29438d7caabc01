//! Default process-level instruments, collected at scrape time.

use std::fmt::{self, Write};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use super::registry::{format_value, Collector};

/// Renders `<ns>process_*` gauges with `service`/`version` const labels.
///
/// Values are read when the registry is rendered, so reset never clears them.
pub struct ProcessCollector {
    id: String,
    namespace: String,
    labels: String,
    started: Instant,
    start_unix: f64,
}

impl ProcessCollector {
    pub fn new(namespace: &str, service: &str) -> Self {
        let start_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();
        Self {
            id: format!("{namespace}process"),
            namespace: namespace.to_string(),
            labels: format!(
                "service=\"{}\",version=\"{}\"",
                service.replace('\\', "\\\\").replace('"', "\\\""),
                env!("CARGO_PKG_VERSION")
            ),
            started: Instant::now(),
            start_unix,
        }
    }

    /// Fully-qualified names this collector renders.
    pub fn metric_names(&self) -> [String; 3] {
        [
            format!("{}process_start_time_seconds", self.namespace),
            format!("{}process_uptime_seconds", self.namespace),
            format!("{}process_resident_memory_bytes", self.namespace),
        ]
    }

    fn gauge(&self, out: &mut String, name: &str, help: &str, v: f64) -> fmt::Result {
        writeln!(out, "# HELP {} {}", name, help)?;
        writeln!(out, "# TYPE {} gauge", name)?;
        writeln!(out, "{}{{{}}} {}", name, self.labels, format_value(v))
    }
}

impl Collector for ProcessCollector {
    fn name(&self) -> &str {
        &self.id
    }

    fn encode(&self, out: &mut String) -> fmt::Result {
        let [start, uptime, rss] = self.metric_names();
        self.gauge(
            out,
            &start,
            "Start time of the process since unix epoch in seconds.",
            self.start_unix,
        )?;
        self.gauge(
            out,
            &uptime,
            "Seconds since the process started.",
            self.started.elapsed().as_secs_f64(),
        )?;
        self.gauge(
            out,
            &rss,
            "Resident memory size in bytes.",
            rss_bytes() as f64,
        )
    }

    fn reset(&self) {}
}

/// Resident set size from the OS (0 when unavailable).
#[cfg(target_os = "linux")]
pub fn rss_bytes() -> u64 {
    // Page-size independent, unlike statm.
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|s| parse_vm_rss(&s))
        .unwrap_or(0)
}

/// `VmRSS:    1234 kB` line from `/proc/<pid>/status`, in bytes.
pub fn parse_vm_rss(status: &str) -> Option<u64> {
    let rest = status.lines().find_map(|l| l.strip_prefix("VmRSS:"))?;
    let mut parts = rest.split_whitespace();
    let value: u64 = parts.next()?.parse().ok()?;
    match parts.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}

#[cfg(not(target_os = "linux"))]
pub fn rss_bytes() -> u64 {
    0
}
