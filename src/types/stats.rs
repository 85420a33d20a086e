use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Outcome of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunSummary {
    pub records_read: u64,
    /// Records without extractable text.
    pub records_skipped: u64,
    /// Index tasks dispatched (one per matching keyword per record).
    pub matches: u64,
    pub indexed: u64,
    pub failures: u64,
    /// True when a stop signal ended the run before the source did.
    pub stopped: bool,
}

/// Counters shared between the reader and the workers of a run.
#[derive(Debug, Default)]
pub(crate) struct RunCounters {
    pub records_read: AtomicU64,
    pub records_skipped: AtomicU64,
    pub matches: AtomicU64,
    pub indexed: AtomicU64,
    pub failures: AtomicU64,
}

impl RunCounters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self, stopped: bool) -> RunSummary {
        RunSummary {
            records_read: self.records_read.load(Ordering::Relaxed),
            records_skipped: self.records_skipped.load(Ordering::Relaxed),
            matches: self.matches.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            stopped,
        }
    }
}

/// Result of one retention pass.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct SweepReport {
    /// Occurrences removed per keyword; keywords that failed are absent.
    pub removed: Vec<(String, u64)>,
    pub failures: u64,
}

impl SweepReport {
    #[must_use]
    pub fn total_removed(&self) -> u64 {
        self.removed.iter().map(|(_, removed)| removed).sum()
    }
}
