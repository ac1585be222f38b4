// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics collection for the correlation pipeline.
//!
//! Tracks stage latencies, backend call outcomes, LLM token usage and
//! caller-analysis cache effectiveness without an external metrics stack.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Backend calls (embedding, LLM, language server) by backend name.
    backends: RwLock<HashMap<String, BackendMetrics>>,

    /// Pipeline stage timings by operation name.
    operations: RwLock<HashMap<String, OperationMetrics>>,

    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self {
            backends: RwLock::new(HashMap::new()),
            operations: RwLock::new(HashMap::new()),
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record one backend call.
    pub fn record_backend(&self, name: &str, duration: Duration, success: bool) {
        if let Ok(mut backends) = self.backends.write() {
            backends
                .entry(name.to_string())
                .or_insert_with(BackendMetrics::new)
                .record(duration, success);
        }
    }

    /// Record a pipeline operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        if let Ok(mut ops) = self.operations.write() {
            ops.entry(name.to_string())
                .or_insert_with(OperationMetrics::new)
                .record(duration);
        }
    }

    /// Record LLM token usage.
    pub fn record_tokens(&self, input: u64, output: u64) {
        self.input_tokens.fetch_add(input, Ordering::Relaxed);
        self.output_tokens.fetch_add(output, Ordering::Relaxed);
    }

    /// Record a caller-analysis cache lookup.
    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.cache_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get metrics for a specific backend.
    pub fn backend_metrics(&self, name: &str) -> Option<BackendMetrics> {
        self.backends.read().ok()?.get(name).cloned()
    }

    /// Get metrics for a specific operation.
    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        self.operations.read().ok()?.get(name).cloned()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            backends: self.backends.read().map(|b| b.clone()).unwrap_or_default(),
            operations: self.operations.read().map(|o| o.clone()).unwrap_or_default(),
            input_tokens: self.input_tokens.load(Ordering::Relaxed),
            output_tokens: self.output_tokens.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            uptime: self.start_time.elapsed(),
        }
    }

    /// Reset all metrics.
    pub fn reset(&self) {
        if let Ok(mut backends) = self.backends.write() {
            backends.clear();
        }
        if let Ok(mut ops) = self.operations.write() {
            ops.clear();
        }
        self.input_tokens.store(0, Ordering::Relaxed);
        self.output_tokens.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.cache_misses.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Call outcomes for one backend.
#[derive(Debug, Clone)]
pub struct BackendMetrics {
    pub calls: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
}

impl BackendMetrics {
    pub fn new() -> Self {
        Self {
            calls: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
        }
    }

    pub fn record(&mut self, duration: Duration, success: bool) {
        self.calls += 1;
        if !success {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
    }

    /// Fraction of calls that failed (0.0 to 1.0).
    pub fn failure_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.failures as f64 / self.calls as f64
        }
    }
}

impl Default for BackendMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing metrics for one pipeline operation.
#[derive(Debug, Clone)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    pub fn new() -> Self {
        Self {
            count: 0,
            total_duration: Duration::ZERO,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }
}

impl Default for OperationMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-bucket latency histogram (bucket bounds in microseconds).
#[derive(Debug, Clone)]
pub struct Histogram {
    buckets: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn with_buckets(buckets: Vec<u64>) -> Self {
        let counts = vec![0; buckets.len() + 1];
        Self { buckets, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let micros = duration.as_micros() as u64;
        let idx = self
            .buckets
            .iter()
            .position(|&b| micros <= b)
            .unwrap_or(self.buckets.len());
        self.counts[idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Upper bucket bound below which `p` percent of samples fall.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = (total as f64 * p / 100.0).ceil() as u64;
        let mut cumulative = 0u64;
        for (i, &count) in self.counts.iter().enumerate() {
            cumulative += count;
            if cumulative >= target {
                let micros = match self.buckets.get(i) {
                    Some(bound) => *bound,
                    None => self.buckets.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_micros(micros);
            }
        }
        Duration::ZERO
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // 1ms, 10ms, 100ms, 1s, 10s, 60s: embedding and LLM calls are slow
        Self::with_buckets(vec![1_000, 10_000, 100_000, 1_000_000, 10_000_000, 60_000_000])
    }
}

/// A point-in-time copy of all metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub backends: HashMap<String, BackendMetrics>,
    pub operations: HashMap<String, OperationMetrics>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::from("=== Metrics Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n", self.uptime));
        report.push_str(&format!(
            "LLM tokens: {} input, {} output\n",
            self.input_tokens, self.output_tokens
        ));
        report.push_str(&format!(
            "Caller cache: {} hits, {} misses\n\n",
            self.cache_hits, self.cache_misses
        ));

        if !self.backends.is_empty() {
            report.push_str("Backends:\n");
            let mut names: Vec<_> = self.backends.keys().collect();
            names.sort();
            for name in names {
                let m = &self.backends[name];
                report.push_str(&format!(
                    "  {}: {} calls, {:.1}% failed, max {:.2?}\n",
                    name,
                    m.calls,
                    m.failure_rate() * 100.0,
                    m.max_duration
                ));
            }
            report.push('\n');
        }

        if !self.operations.is_empty() {
            report.push_str("Operations:\n");
            let mut names: Vec<_> = self.operations.keys().collect();
            names.sort();
            for name in names {
                let m = &self.operations[name];
                report.push_str(&format!(
                    "  {}: {} ops, avg {:.2?}, p99 {:.2?}\n",
                    name,
                    m.count,
                    m.avg_duration(),
                    m.histogram.percentile(99.0)
                ));
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_metrics() {
        let mut metrics = BackendMetrics::new();
        metrics.record(Duration::from_millis(100), true);
        metrics.record(Duration::from_millis(300), false);

        assert_eq!(metrics.calls, 2);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.max_duration, Duration::from_millis(300));
        assert!((metrics.failure_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_operation_metrics_average() {
        let mut metrics = OperationMetrics::new();
        metrics.record(Duration::from_millis(10));
        metrics.record(Duration::from_millis(30));

        assert_eq!(metrics.count, 2);
        assert_eq!(metrics.avg_duration(), Duration::from_millis(20));
    }

    #[test]
    fn test_histogram_percentile() {
        let mut hist = Histogram::default();
        for _ in 0..10 {
            hist.record(Duration::from_millis(5));
        }
        assert_eq!(hist.counts()[1], 10);
        assert_eq!(hist.percentile(99.0), Duration::from_millis(10));
    }

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = Metrics::new();
        metrics.record_backend("anthropic", Duration::from_millis(900), true);
        metrics.record_tokens(1200, 300);
        metrics.record_cache_lookup(true);
        metrics.record_cache_lookup(false);

        let snapshot = metrics.snapshot();
        assert!(snapshot.backends.contains_key("anthropic"));
        assert_eq!(snapshot.input_tokens, 1200);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
        assert!(snapshot.format_report().contains("anthropic"));

        metrics.reset();
        assert!(metrics.backend_metrics("anthropic").is_none());
        assert_eq!(metrics.snapshot().input_tokens, 0);
    }
}
