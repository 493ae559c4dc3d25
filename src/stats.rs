//! Run summary counters.

use std::time::{Duration, Instant};

/// Counters for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Items fetched and written this run.
    pub downloaded: usize,
    /// Items already recorded as downloaded by an earlier run.
    pub skipped: usize,
    /// Items whose fetch or write failed this run.
    pub failed: usize,
    /// Number of unique items considered.
    pub total: usize,
    /// Bytes written to disk this run.
    pub bytes: u64,
    /// Wall-clock time spent in the run.
    pub elapsed: Duration,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    /// Creates an all-zero summary.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            downloaded: 0,
            skipped: 0,
            failed: 0,
            total: 0,
            bytes: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Number of items that were actually attempted (downloaded or failed).
    #[must_use]
    pub const fn attempted(&self) -> usize {
        self.downloaded + self.failed
    }
}

/// Accumulates a [`RunSummary`] while the pipeline runs.
pub struct SummaryBuilder {
    summary: RunSummary,
    start_time: Instant,
}

impl Default for SummaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            summary: RunSummary::new(),
            start_time: Instant::now(),
        }
    }

    pub const fn set_total(&mut self, total: usize) {
        self.summary.total = total;
    }

    pub const fn add_skipped(&mut self) {
        self.summary.skipped += 1;
    }

    pub const fn add_download(&mut self, bytes: u64) {
        self.summary.downloaded += 1;
        self.summary.bytes += bytes;
    }

    pub const fn add_failure(&mut self) {
        self.summary.failed += 1;
    }

    /// Returns the counters so far without consuming the builder.
    #[must_use]
    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            elapsed: self.start_time.elapsed(),
            ..self.summary.clone()
        }
    }

    /// Builds the final summary.
    #[must_use]
    pub fn build(self) -> RunSummary {
        self.snapshot()
    }
}
