//! Offset watermark tracking
//!
//! Publishes complete out of order, but a partition can only be committed up
//! to its first unsettled offset. The tracker keeps the in-flight offsets of
//! every partition and reports the next committable position.

use std::collections::{BTreeSet, HashMap};

use contracts::RecordOrigin;

#[derive(Debug, Default)]
struct PartitionState {
    /// Offsets handed downstream whose publish outcome is unknown
    pending: BTreeSet<i64>,
    /// Lowest offset ever tracked
    lowest_tracked: Option<i64>,
    /// Highest offset ever tracked
    highest_tracked: Option<i64>,
    /// Last committed position (next offset to read)
    committed: Option<i64>,
}

impl PartitionState {
    fn committable(&self) -> Option<i64> {
        let next = match self.pending.first() {
            Some(&first_pending) => first_pending,
            None => self.highest_tracked? + 1,
        };
        let floor = self.committed.unwrap_or(self.lowest_tracked?);
        (next > floor).then_some(next)
    }
}

/// Per-partition offset watermark tracker
#[derive(Debug, Default)]
pub struct OffsetTracker {
    partitions: HashMap<(String, i32), PartitionState>,
}

impl OffsetTracker {
    /// Create an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an offset that was handed to the dispatcher
    ///
    /// Offsets of one partition must be tracked in increasing order.
    pub fn track(&mut self, origin: &RecordOrigin) {
        let state = self
            .partitions
            .entry((origin.topic.clone(), origin.partition))
            .or_default();
        state.pending.insert(origin.offset);
        state.lowest_tracked = Some(
            state
                .lowest_tracked
                .map_or(origin.offset, |l| l.min(origin.offset)),
        );
        state.highest_tracked = Some(
            state
                .highest_tracked
                .map_or(origin.offset, |h| h.max(origin.offset)),
        );
    }

    /// Mark an offset's publish outcome as settled
    ///
    /// Returns the position to commit for that partition, if it advanced.
    pub fn settle(&mut self, origin: &RecordOrigin) -> Option<i64> {
        let state = self
            .partitions
            .get_mut(&(origin.topic.clone(), origin.partition))?;
        if !state.pending.remove(&origin.offset) {
            return None;
        }

        let next = state.committable()?;
        state.committed = Some(next);
        Some(next)
    }

    /// Offsets still awaiting a publish outcome, across all partitions
    pub fn pending_count(&self) -> usize {
        self.partitions.values().map(|p| p.pending.len()).sum()
    }
}
