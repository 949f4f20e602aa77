//! Relay 指标模块
//!
//! 指标名称、描述注册，以及运行结束时的统计摘要。

use std::time::Duration;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

pub use contracts::metric_names::{
    MESSAGES_PUBLISHED_TOTAL, MESSAGES_RECEIVED_TOTAL, PUBLISH_FAILURES_TOTAL, PUBLISH_IN_FLIGHT,
    PUBLISH_LATENCY_MS, SOURCE_POLL_ERRORS_TOTAL,
};

/// 注册指标描述（Prometheus HELP 文本）
pub fn describe_metrics() {
    describe_counter!(
        MESSAGES_RECEIVED_TOTAL,
        Unit::Count,
        "Messages received from the source topic"
    );
    describe_counter!(
        MESSAGES_PUBLISHED_TOTAL,
        Unit::Count,
        "Messages acknowledged by the destination topic"
    );
    describe_counter!(
        PUBLISH_FAILURES_TOTAL,
        Unit::Count,
        "Publishes that failed and were handed to the error sink"
    );
    describe_counter!(
        SOURCE_POLL_ERRORS_TOTAL,
        Unit::Count,
        "Recoverable source poll errors"
    );
    describe_gauge!(
        PUBLISH_IN_FLIGHT,
        Unit::Count,
        "Publish tasks currently outstanding"
    );
    describe_histogram!(
        PUBLISH_LATENCY_MS,
        Unit::Milliseconds,
        "Time from publish start to broker acknowledgment"
    );
}

/// 一次运行的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayCounts {
    pub received: u64,
    pub published: u64,
    pub failed: u64,
    pub aborted: u64,
    pub poll_errors: u64,
    pub commits: u64,
    pub commit_errors: u64,
}

/// 运行期统计聚合器
///
/// 周期性采样在途发布数，结束时与计数合并生成摘要。
#[derive(Debug, Clone, Default)]
pub struct RelayStatsAggregator {
    in_flight: RunningStats,
}

impl RelayStatsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一次在途发布数采样
    pub fn sample_in_flight(&mut self, in_flight: usize) {
        self.in_flight.push(in_flight as f64);
    }

    /// 生成摘要报告
    pub fn summary(&self, counts: RelayCounts, duration: Duration) -> RelaySummary {
        let secs = duration.as_secs_f64();
        let settled = counts.published + counts.failed;
        RelaySummary {
            counts,
            duration,
            throughput: if secs > 0.0 {
                counts.published as f64 / secs
            } else {
                0.0
            },
            failure_rate: if settled > 0 {
                counts.failed as f64 / settled as f64 * 100.0
            } else {
                0.0
            },
            in_flight: StatsSummary::from(&self.in_flight),
        }
    }
}

/// 转发摘要
#[derive(Debug, Clone, Default)]
pub struct RelaySummary {
    pub counts: RelayCounts,
    pub duration: Duration,
    /// 每秒成功发布数
    pub throughput: f64,
    /// 失败占已结算发布的百分比
    pub failure_rate: f64,
    pub in_flight: StatsSummary,
}

impl std::fmt::Display for RelaySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = &self.counts;
        writeln!(f, "=== Relay Summary ===")?;
        writeln!(f, "Duration: {:.2}s", self.duration.as_secs_f64())?;
        writeln!(f, "Received: {}", c.received)?;
        writeln!(
            f,
            "Published: {} ({:.2} msg/s)",
            c.published, self.throughput
        )?;
        writeln!(f, "Failed: {} ({:.2}%)", c.failed, self.failure_rate)?;
        if c.aborted > 0 {
            writeln!(f, "Aborted at drain timeout: {}", c.aborted)?;
        }
        writeln!(f, "Poll errors: {}", c.poll_errors)?;
        if c.commits > 0 || c.commit_errors > 0 {
            writeln!(
                f,
                "Offset commits: {} ({} failed)",
                c.commits, c.commit_errors
            )?;
        }
        writeln!(f, "In-flight publishes: {}", self.in_flight)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.0}, max={:.0}, mean={:.2}, std={:.2} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_summary_rates() {
        let mut agg = RelayStatsAggregator::new();
        agg.sample_in_flight(4);
        agg.sample_in_flight(0);

        let counts = RelayCounts {
            received: 100,
            published: 96,
            failed: 4,
            ..Default::default()
        };
        let summary = agg.summary(counts, Duration::from_secs(2));

        assert!((summary.throughput - 48.0).abs() < 1e-10);
        assert!((summary.failure_rate - 4.0).abs() < 1e-10);
        assert_eq!(summary.in_flight.count, 2);
        assert!((summary.in_flight.max - 4.0).abs() < 1e-10);
    }

    #[test]
    fn test_metric_names_unique_and_scoped() {
        let names = [
            MESSAGES_RECEIVED_TOTAL,
            MESSAGES_PUBLISHED_TOTAL,
            PUBLISH_FAILURES_TOTAL,
            SOURCE_POLL_ERRORS_TOTAL,
            PUBLISH_IN_FLIGHT,
            PUBLISH_LATENCY_MS,
        ];
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
        assert!(names.iter().all(|n| n.starts_with("topic_relay_")));
    }

    #[test]
    fn test_summary_empty_run() {
        let summary = RelayStatsAggregator::new().summary(RelayCounts::default(), Duration::ZERO);
        assert_eq!(summary.throughput, 0.0);
        assert_eq!(summary.failure_rate, 0.0);
        assert!(format!("{}", summary).contains("In-flight publishes: N/A"));
    }

    #[test]
    fn test_summary_display() {
        let counts = RelayCounts {
            received: 10,
            published: 9,
            failed: 1,
            aborted: 2,
            ..Default::default()
        };
        let output = format!(
            "{}",
            RelayStatsAggregator::new().summary(counts, Duration::from_secs(1))
        );
        assert!(output.contains("Received: 10"));
        assert!(output.contains("Failed: 1 (10.00%)"));
        assert!(output.contains("Aborted at drain timeout: 2"));
        assert!(!output.contains("Offset commits"));
    }
}
