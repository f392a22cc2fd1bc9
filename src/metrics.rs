//! Prometheus-compatible metrics exporter for the dnstap pipeline: records
//! ingested, dropped at envelope/DNS decode, filtered, and dispatched per
//! sink.
//!
//! Endpoint: GET /metrics (on the HTTP surface).

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

/// Global metrics counters, atomically updated from the pipeline worker.
pub struct PipelineMetrics {
    /// Total frames received from ingress, before any decode attempt.
    pub ingested_total: AtomicU64,
    /// Total envelopes dropped because the envelope itself failed to
    /// decode, or carried no usable message.
    pub envelope_dropped_total: AtomicU64,
    /// Total records where DNS-payload parsing failed at some stage and
    /// `malformed_packet` was set.
    pub malformed_total: AtomicU64,
    /// Total records dropped by the filter enricher.
    pub filtered_total: AtomicU64,
    /// Per-sink dispatch counters, keyed by `Sink::label()`.
    dispatched_by_sink: Mutex<HashMap<String, AtomicU64>>,
    pub start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            ingested_total: AtomicU64::new(0),
            envelope_dropped_total: AtomicU64::new(0),
            malformed_total: AtomicU64::new(0),
            filtered_total: AtomicU64::new(0),
            dispatched_by_sink: Mutex::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    pub fn record_ingested(&self) {
        self.ingested_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_envelope_dropped(&self) {
        self.envelope_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.filtered_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatched(&self, sink_label: &str) {
        let mut map = self.dispatched_by_sink.lock();
        map.entry(sink_label.to_string()).or_insert_with(|| AtomicU64::new(0)).fetch_add(1, Ordering::Relaxed);
    }

    fn dispatched_snapshot(&self) -> Vec<(String, u64)> {
        let map = self.dispatched_by_sink.lock();
        let mut entries: Vec<_> = map.iter().map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed))).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate Prometheus-format metrics text from the pipeline counters and
/// the correlation cache's own stats.
pub fn render_metrics(metrics: &PipelineMetrics, cache_stats: crate::correlate::CacheStats) -> String {
    let mut out = String::with_capacity(2048);

    let uptime = metrics.start_time.elapsed().as_secs_f64();
    write_help_type(&mut out, "dnstap_pipeline_up", "Whether the pipeline is up.", "gauge");
    writeln!(out, "dnstap_pipeline_up 1").ok();

    write_help_type(&mut out, "dnstap_pipeline_uptime_seconds", "Uptime since pipeline start.", "counter");
    writeln!(out, "dnstap_pipeline_uptime_seconds {:.3}", uptime).ok();

    let ingested = metrics.ingested_total.load(Ordering::Relaxed);
    write_help_type(&mut out, "dnstap_pipeline_ingested_total", "Total frames received from ingress.", "counter");
    writeln!(out, "dnstap_pipeline_ingested_total {}", ingested).ok();

    let envelope_dropped = metrics.envelope_dropped_total.load(Ordering::Relaxed);
    write_help_type(
        &mut out,
        "dnstap_pipeline_envelope_dropped_total",
        "Total envelopes silently dropped on decode failure.",
        "counter",
    );
    writeln!(out, "dnstap_pipeline_envelope_dropped_total {}", envelope_dropped).ok();

    let malformed = metrics.malformed_total.load(Ordering::Relaxed);
    write_help_type(
        &mut out,
        "dnstap_pipeline_malformed_total",
        "Total records flagged malformed_packet during DNS parsing.",
        "counter",
    );
    writeln!(out, "dnstap_pipeline_malformed_total {}", malformed).ok();

    let filtered = metrics.filtered_total.load(Ordering::Relaxed);
    write_help_type(&mut out, "dnstap_pipeline_filtered_total", "Total records dropped by the filter enricher.", "counter");
    writeln!(out, "dnstap_pipeline_filtered_total {}", filtered).ok();

    write_help_type(&mut out, "dnstap_pipeline_dispatched_total", "Total records dispatched, per sink.", "counter");
    for (label, count) in metrics.dispatched_snapshot() {
        writeln!(out, "dnstap_pipeline_dispatched_total{{sink=\"{}\"}} {}", label, count).ok();
    }

    write_help_type(&mut out, "dnstap_pipeline_correlation_cache_entries", "Current correlation cache occupancy.", "gauge");
    writeln!(out, "dnstap_pipeline_correlation_cache_entries {}", cache_stats.entries).ok();

    write_help_type(&mut out, "dnstap_pipeline_correlation_cache_hits_total", "Total correlation cache hits.", "counter");
    writeln!(out, "dnstap_pipeline_correlation_cache_hits_total {}", cache_stats.hits).ok();

    write_help_type(&mut out, "dnstap_pipeline_correlation_cache_misses_total", "Total correlation cache misses.", "counter");
    writeln!(out, "dnstap_pipeline_correlation_cache_misses_total {}", cache_stats.misses).ok();

    write_help_type(
        &mut out,
        "dnstap_pipeline_correlation_cache_expired_total",
        "Total correlation cache entries removed by the TTL sweep.",
        "counter",
    );
    writeln!(out, "dnstap_pipeline_correlation_cache_expired_total {}", cache_stats.expired).ok();

    write_help_type(&mut out, "dnstap_pipeline_build_info", "Pipeline build information.", "gauge");
    writeln!(out, "dnstap_pipeline_build_info{{version=\"{}\"}} 1", env!("CARGO_PKG_VERSION")).ok();

    out
}

fn write_help_type(out: &mut String, name: &str, help: &str, metric_type: &str) {
    writeln!(out, "# HELP {} {}", name, help).ok();
    writeln!(out, "# TYPE {} {}", name, metric_type).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlate::CacheStats;

    #[test]
    fn render_includes_counters_and_dispatch_labels() {
        let metrics = PipelineMetrics::new();
        metrics.record_ingested();
        metrics.record_ingested();
        metrics.record_filtered();
        metrics.record_dispatched("text:/var/log/dns.log");
        metrics.record_dispatched("text:/var/log/dns.log");

        let stats = CacheStats { entries: 3, hits: 5, misses: 1, expired: 2 };
        let text = render_metrics(&metrics, stats);

        assert!(text.contains("dnstap_pipeline_ingested_total 2"));
        assert!(text.contains("dnstap_pipeline_filtered_total 1"));
        assert!(text.contains("sink=\"text:/var/log/dns.log\"} 2"));
        assert!(text.contains("dnstap_pipeline_correlation_cache_entries 3"));
    }
}
