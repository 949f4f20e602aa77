//! Relay run statistics.

use dispatcher::DispatchReport;
use ingestion::{CompletionReason, MetricsSnapshot as SourceSnapshot};
use observability::{RelayCounts, RelaySummary};

/// Statistics from a relay run
#[derive(Debug, Clone)]
pub struct RelayStats {
    /// Source name (e.g. `kafka:route.new-direction`)
    pub source: String,

    /// Why the source stopped
    pub completion: CompletionReason,

    /// Counts, rates and in-flight samples
    pub summary: RelaySummary,
}

impl RelayStats {
    /// Merge dispatcher and source counters
    pub fn counts(report: &DispatchReport, source: &SourceSnapshot) -> RelayCounts {
        RelayCounts {
            received: report.received,
            published: report.published,
            failed: report.failed,
            aborted: report.aborted,
            poll_errors: source.poll_errors,
            commits: source.commits,
            commit_errors: source.commit_errors,
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!();
        println!("Source: {} ({:?})", self.source, self.completion);
        println!("{}", self.summary);
    }
}
