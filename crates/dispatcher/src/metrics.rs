//! Relay metrics for observability

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use contracts::metric_names::{
    MESSAGES_PUBLISHED_TOTAL, PUBLISH_FAILURES_TOTAL, PUBLISH_IN_FLIGHT, PUBLISH_LATENCY_MS,
};

/// Counters shared by the dispatcher loop and its publish tasks
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Messages taken off the inbound channel
    received: AtomicU64,
    /// Publishes acknowledged by the broker
    published: AtomicU64,
    /// Publishes that failed and were reported
    failed: AtomicU64,
    /// Publishes abandoned at drain timeout
    aborted: AtomicU64,
    /// Publish tasks that panicked
    panicked: AtomicU64,
    /// Publish tasks currently running
    in_flight: AtomicUsize,
    /// Highest `in_flight` observed
    peak_in_flight: AtomicUsize,
}

impl RelayMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn inc_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    /// Record a broker acknowledgment
    pub fn record_published(&self, sink: &str, latency: Duration) {
        self.published.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(MESSAGES_PUBLISHED_TOTAL, "sink" => sink.to_string())
            .increment(1);
        metrics::histogram!(PUBLISH_LATENCY_MS, "sink" => sink.to_string())
            .record(latency.as_secs_f64() * 1000.0);
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Record a failed publish
    pub fn record_failed(&self, sink: &str) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(PUBLISH_FAILURES_TOTAL, "sink" => sink.to_string())
            .increment(1);
    }

    pub fn aborted(&self) -> u64 {
        self.aborted.load(Ordering::Relaxed)
    }

    pub fn add_aborted(&self, count: u64) {
        self.aborted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }

    pub fn inc_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    /// A publish task started
    pub fn task_started(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::Relaxed);
        metrics::gauge!(PUBLISH_IN_FLIGHT).set(now as f64);
    }

    /// A publish task ended (finished or aborted)
    pub fn task_ended(&self) {
        let now = self.in_flight.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        metrics::gauge!(PUBLISH_IN_FLIGHT).set(now as f64);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            received: self.received(),
            published: self.published(),
            failed: self.failed(),
            aborted: self.aborted(),
            panicked: self.panicked(),
            in_flight: self.in_flight(),
            peak_in_flight: self.peak_in_flight(),
        }
    }
}

/// Snapshot of relay metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub received: u64,
    pub published: u64,
    pub failed: u64,
    pub aborted: u64,
    pub panicked: u64,
    pub in_flight: usize,
    pub peak_in_flight: usize,
}

impl MetricsSnapshot {
    /// Messages whose publish outcome is known
    pub fn settled(&self) -> u64 {
        self.published + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_tracks_peak() {
        let m = RelayMetrics::new();
        m.task_started();
        m.task_started();
        m.task_ended();
        m.task_started();
        m.task_ended();
        m.task_ended();

        let snap = m.snapshot();
        assert_eq!(snap.in_flight, 0);
        assert_eq!(snap.peak_in_flight, 2);
    }

    #[test]
    fn test_settled_sums_outcomes() {
        let m = RelayMetrics::new();
        m.record_published("kafka", Duration::from_millis(3));
        m.record_failed("kafka");
        m.record_failed("kafka");
        assert_eq!(m.snapshot().settled(), 3);
    }
}
