//! Source runner configuration and metrics

use std::sync::atomic::{AtomicU64, Ordering};

use contracts::metric_names::{MESSAGES_RECEIVED_TOTAL, SOURCE_POLL_ERRORS_TOTAL};

pub use contracts::OffsetPolicy;

/// Source runner configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Outbound channel capacity
    pub channel_capacity: usize,

    /// When consumed offsets are committed
    pub offset_policy: OffsetPolicy,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            offset_policy: OffsetPolicy::Auto,
        }
    }
}

impl SourceConfig {
    /// Create new source configuration
    pub fn new(channel_capacity: usize, offset_policy: OffsetPolicy) -> Self {
        Self {
            channel_capacity,
            offset_policy,
        }
    }
}

/// Ingestion metrics
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    /// Total messages received from the broker
    pub messages_received: AtomicU64,

    /// Recoverable poll errors
    pub poll_errors: AtomicU64,

    /// Offsets committed
    pub commits: AtomicU64,

    /// Failed commits
    pub commit_errors: AtomicU64,
}

impl IngestionMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Record message received
    pub fn record_received(&self, source: &str) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(MESSAGES_RECEIVED_TOTAL, "source" => source.to_string())
            .increment(1);
    }

    /// Record recoverable poll error
    pub fn record_poll_error(&self, source: &str) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(SOURCE_POLL_ERRORS_TOTAL, "source" => source.to_string())
            .increment(1);
    }

    /// Record commit outcome
    pub fn record_commit(&self, success: bool) {
        if success {
            self.commits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.commit_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Get snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            commit_errors: self.commit_errors.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total messages received from the broker
    pub messages_received: u64,

    /// Recoverable poll errors
    pub poll_errors: u64,

    /// Offsets committed
    pub commits: u64,

    /// Failed commits
    pub commit_errors: u64,
}
