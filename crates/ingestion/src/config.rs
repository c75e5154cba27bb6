//! Queue configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

/// Hand-off queue configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueConfig {
    /// Channel capacity, 0 = unbounded
    pub capacity: usize,
}

impl QueueConfig {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn is_unbounded(&self) -> bool {
        self.capacity == 0
    }
}

/// No read gap observed yet
const NO_GAP: u64 = u64::MAX;

/// Ingestion metrics
#[derive(Debug)]
pub struct IngestionMetrics {
    /// Total events handed off
    pub events_received: AtomicU64,

    /// Events dropped because the queue was full
    pub events_dropped: AtomicU64,

    /// Power-state transitions handed off
    pub power_transitions: AtomicU64,

    /// Lines that could not be decoded (bad JSON, unknown level)
    pub parse_errors: AtomicU64,

    /// 设备两次读取之间的最短间隔 (微秒)
    pub min_read_gap_micros: AtomicU64,
}

impl Default for IngestionMetrics {
    fn default() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
            power_transitions: AtomicU64::new(0),
            parse_errors: AtomicU64::new(0),
            min_read_gap_micros: AtomicU64::new(NO_GAP),
        }
    }
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Time between two consecutive device reads
    pub fn record_read_gap(&self, gap_secs: f64) {
        let micros = (gap_secs.max(0.0) * 1e6).round() as u64;
        self.min_read_gap_micros.fetch_min(micros, Ordering::Relaxed);
    }

    pub fn record_received(&self, source: &str) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bootstats_events_received_total", "source" => source.to_string())
            .increment(1);
    }

    pub fn record_dropped(&self, source: &str) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("bootstats_events_dropped_total", "source" => source.to_string())
            .increment(1);
    }

    pub fn record_power_transition(&self) {
        self.power_transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_error(&self) {
        self.parse_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            power_transitions: self.power_transitions.load(Ordering::Relaxed),
            parse_errors: self.parse_errors.load(Ordering::Relaxed),
            min_read_gap_micros: match self.min_read_gap_micros.load(Ordering::Relaxed) {
                NO_GAP => None,
                micros => Some(micros),
            },
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub events_received: u64,
    pub events_dropped: u64,
    pub power_transitions: u64,
    pub parse_errors: u64,
    /// `None` until a device has been read twice
    pub min_read_gap_micros: Option<u64>,
}

impl MetricsSnapshot {
    pub fn min_read_gap_secs(&self) -> Option<f64> {
        self.min_read_gap_micros.map(|micros| micros as f64 / 1e6)
    }
}
