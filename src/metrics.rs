use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

/// Running latency summary, Welford accumulation.
#[derive(Debug, Default)]
struct LatencyStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl LatencyStats {
    fn observe(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    fn stddev(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            (self.m2 / (self.count - 1) as f64).sqrt()
        }
    }
}

/// One metric's state, shared and mutated by concurrent calls.
#[derive(Debug, Default)]
pub struct MetricRecord {
    errors: AtomicU64,
    unexpected: AtomicU64,
    latency: Mutex<LatencyStats>,
}

impl MetricRecord {
    pub fn observe(&self, duration_ms: f64) {
        self.latency.lock().observe(duration_ms);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unexpected(&self) {
        self.unexpected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        let latency = self.latency.lock();
        MetricSnapshot {
            count: latency.count,
            error_count: self.errors.load(Ordering::Relaxed),
            unexpected_count: self.unexpected.load(Ordering::Relaxed),
            min_ms: latency.min,
            max_ms: latency.max,
            mean_ms: latency.mean,
            stddev_ms: latency.stddev(),
        }
    }
}

/// Point-in-time view of one metric, for the pull-model reporting sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub count: u64,
    pub error_count: u64,
    pub unexpected_count: u64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
}

/// Explicitly constructed, explicitly injected store of per-name metric
/// records. One instance is typically shared by every policy chain the host
/// builds.
#[derive(Default)]
pub struct MetricAggregator {
    records: DashMap<String, Arc<MetricRecord>>,
}

impl MetricAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent registration: concurrent first-observers of the same name
    /// share the winner's record.
    pub fn register(&self, name: &str) -> Arc<MetricRecord> {
        self.records
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn observe(&self, name: &str, duration_ms: f64) {
        self.register(name).observe(duration_ms);
    }

    pub fn record_error(&self, name: &str) {
        self.register(name).record_error();
    }

    pub fn record_unexpected(&self, name: &str) {
        self.register(name).record_unexpected();
    }

    pub fn snapshot(&self, name: &str) -> Option<MetricSnapshot> {
        self.records.get(name).map(|record| record.snapshot())
    }

    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|entry| entry.key().clone()).collect()
    }
}
