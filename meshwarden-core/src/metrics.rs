use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use sysinfo::{Disks, System};

const SYSTEM_METRICS_TTL: Duration = Duration::from_secs(2);

#[derive(Debug, Default)]
struct Counters {
    ping_submitted_total: AtomicU64,
    ping_completed_total: AtomicU64,
    ping_failed_total: AtomicU64,
    app_request_total: AtomicU64,
    // stored as microseconds to keep this lock-free; rendered back to
    // fractional seconds in the exposition text.
    app_request_duration_micros_sum: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClientGauges {
    pub total: u64,
    pub active: u64,
    pub online: u64,
    pub offline: u64,
    pub never_pinged: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutorGauges {
    pub max_workers: u64,
    pub active_threads: u64,
    pub is_shutdown: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct SystemGauges {
    cpu_percent: f64,
    memory_percent: f64,
    memory_used_bytes: u64,
    memory_total_bytes: u64,
    disk_percent: f64,
    disk_used_bytes: u64,
    disk_total_bytes: u64,
}

struct SystemMetricsCache {
    refreshed_at: Option<Instant>,
    value: SystemGauges,
    sys: System,
}

/// Process-wide metrics registry: lock-free counters plus a short-TTL cache
/// for system resource gauges (refreshing `sysinfo` on every scrape would be
/// needlessly expensive under frequent polling).
pub struct Metrics {
    started_at: Instant,
    counters: Counters,
    client_gauges: Mutex<ClientGauges>,
    executor_gauges: Mutex<ExecutorGauges>,
    system_cache: Mutex<SystemMetricsCache>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            counters: Counters::default(),
            client_gauges: Mutex::new(ClientGauges::default()),
            executor_gauges: Mutex::new(ExecutorGauges::default()),
            system_cache: Mutex::new(SystemMetricsCache {
                refreshed_at: None,
                value: SystemGauges::default(),
                sys: System::new(),
            }),
        }
    }

    pub fn record_ping_submitted(&self) {
        self.counters.ping_submitted_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ping_completed(&self, ok: bool) {
        self.counters.ping_completed_total.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.counters.ping_failed_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_http_request(&self, duration: Duration) {
        self.counters.app_request_total.fetch_add(1, Ordering::Relaxed);
        self.counters
            .app_request_duration_micros_sum
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn set_client_gauges(&self, gauges: ClientGauges) {
        *self.client_gauges.lock() = gauges;
    }

    pub fn set_executor_gauges(&self, gauges: ExecutorGauges) {
        *self.executor_gauges.lock() = gauges;
    }

    fn refresh_system_gauges_if_stale(&self) -> SystemGauges {
        let mut cache = self.system_cache.lock();
        let stale = cache
            .refreshed_at
            .map(|t| t.elapsed() >= SYSTEM_METRICS_TTL)
            .unwrap_or(true);
        if stale {
            cache.sys.refresh_cpu_usage();
            cache.sys.refresh_memory();
            let cpu_percent = cache.sys.global_cpu_usage() as f64;
            let memory_total_bytes = cache.sys.total_memory();
            let memory_used_bytes = cache.sys.used_memory();
            let memory_percent = if memory_total_bytes > 0 {
                (memory_used_bytes as f64 / memory_total_bytes as f64) * 100.0
            } else {
                0.0
            };

            let disks = Disks::new_with_refreshed_list();
            let (disk_total_bytes, disk_used_bytes) = disks.list().iter().fold(
                (0u64, 0u64),
                |(total, used), disk| {
                    let disk_total = disk.total_space();
                    let disk_used = disk_total.saturating_sub(disk.available_space());
                    (total + disk_total, used + disk_used)
                },
            );
            let disk_percent = if disk_total_bytes > 0 {
                (disk_used_bytes as f64 / disk_total_bytes as f64) * 100.0
            } else {
                0.0
            };

            cache.value = SystemGauges {
                cpu_percent,
                memory_percent,
                memory_used_bytes,
                memory_total_bytes,
                disk_percent,
                disk_used_bytes,
                disk_total_bytes,
            };
            cache.refreshed_at = Some(Instant::now());
        }
        cache.value
    }

    /// Renders the full metric set as Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let system = self.refresh_system_gauges_if_stale();
        let client = *self.client_gauges.lock();
        let executor = *self.executor_gauges.lock();

        let mut out = String::new();
        let counter = |out: &mut String, name: &str, value: u64| {
            out.push_str(&format!("# TYPE {name} counter\n{name} {value}\n"));
        };
        let gauge_u64 = |out: &mut String, name: &str, value: u64| {
            out.push_str(&format!("# TYPE {name} gauge\n{name} {value}\n"));
        };
        let gauge_f64 = |out: &mut String, name: &str, value: f64| {
            out.push_str(&format!("# TYPE {name} gauge\n{name} {value:.4}\n"));
        };

        counter(
            &mut out,
            "ping_submitted_total",
            self.counters.ping_submitted_total.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "ping_completed_total",
            self.counters.ping_completed_total.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "ping_failed_total",
            self.counters.ping_failed_total.load(Ordering::Relaxed),
        );
        counter(
            &mut out,
            "app_request_total",
            self.counters.app_request_total.load(Ordering::Relaxed),
        );
        let duration_sum_seconds =
            self.counters.app_request_duration_micros_sum.load(Ordering::Relaxed) as f64 / 1_000_000.0;
        gauge_f64(&mut out, "app_request_duration_seconds_sum", duration_sum_seconds);

        gauge_u64(&mut out, "clients_total", client.total);
        gauge_u64(&mut out, "clients_active", client.active);
        gauge_u64(&mut out, "clients_online", client.online);
        gauge_u64(&mut out, "clients_offline", client.offline);
        gauge_u64(&mut out, "clients_never_pinged", client.never_pinged);

        gauge_u64(&mut out, "executor_max_workers", executor.max_workers);
        gauge_u64(&mut out, "executor_active_threads", executor.active_threads);
        gauge_u64(&mut out, "executor_is_shutdown", executor.is_shutdown as u64);

        gauge_f64(&mut out, "app_uptime_seconds", self.started_at.elapsed().as_secs_f64());

        gauge_f64(&mut out, "system_cpu_percent", system.cpu_percent);
        gauge_f64(&mut out, "system_memory_percent", system.memory_percent);
        gauge_u64(&mut out, "system_memory_used_bytes", system.memory_used_bytes);
        gauge_u64(&mut out, "system_memory_total_bytes", system.memory_total_bytes);
        gauge_f64(&mut out, "system_disk_percent", system.disk_percent);
        gauge_u64(&mut out, "system_disk_used_bytes", system.disk_used_bytes);
        gauge_u64(&mut out, "system_disk_total_bytes", system.disk_total_bytes);

        out
    }

    pub fn as_json_summary(&self) -> HashMap<String, serde_json::Value> {
        let client = *self.client_gauges.lock();
        let mut out = HashMap::new();
        out.insert("clients_total".to_string(), client.total.into());
        out.insert("clients_active".to_string(), client.active.into());
        out.insert("clients_online".to_string(), client.online.into());
        out.insert("clients_offline".to_string(), client.offline.into());
        out.insert("clients_never_pinged".to_string(), client.never_pinged.into());
        out.insert(
            "ping_submitted_total".to_string(),
            self.counters.ping_submitted_total.load(Ordering::Relaxed).into(),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prometheus_exposition_includes_type_lines() {
        let metrics = Metrics::new();
        metrics.record_ping_submitted();
        let text = metrics.render_prometheus();
        assert!(text.contains("# TYPE ping_submitted_total counter"));
        assert!(text.contains("ping_submitted_total 1"));
    }

    #[test]
    fn failed_ping_increments_both_counters() {
        let metrics = Metrics::new();
        metrics.record_ping_completed(false);
        let text = metrics.render_prometheus();
        assert!(text.contains("ping_completed_total 1"));
        assert!(text.contains("ping_failed_total 1"));
    }
}
