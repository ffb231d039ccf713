//! Per-file counters and the batch committer

use tracing::info;

use crate::error::IngestResult;
use crate::store::LoadStore;

/// Counters for one file
///
/// `tracker` counts every record read; `progress` counts only records that
/// were inserted. A rejected record therefore moves `tracker` alone, and
/// `progress <= tracker` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub tracker: u64,
    pub progress: u64,
}

impl LoadProgress {
    pub fn record_success(&mut self) {
        self.tracker += 1;
        self.progress += 1;
    }

    pub fn record_failure(&mut self) {
        self.tracker += 1;
    }

    pub fn failed(&self) -> u64 {
        self.tracker - self.progress
    }

    /// Percentage of records inserted; 100 for an empty file
    pub fn success_rate(&self) -> f64 {
        if self.tracker == 0 {
            100.0
        } else {
            self.progress as f64 / self.tracker as f64 * 100.0
        }
    }
}

/// Commits the open transaction every `interval` successful inserts
#[derive(Debug, Clone, Copy)]
pub struct BatchCommitter {
    interval: u64,
}

impl BatchCommitter {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// True when `progress` has just reached a non-zero multiple of the
    /// interval
    pub fn is_due(&self, progress: &LoadProgress) -> bool {
        progress.progress != 0 && progress.progress % self.interval == 0
    }

    /// Call after each successful insert. Commits and reopens the
    /// transaction when a batch boundary is reached; returns whether it did.
    pub async fn after_success<S: LoadStore + ?Sized>(
        &self,
        store: &mut S,
        progress: &LoadProgress,
    ) -> IngestResult<bool> {
        if !self.is_due(progress) {
            return Ok(false);
        }

        store.commit().await?;
        store.begin().await?;
        info!(
            committed = progress.progress,
            tracker = progress.tracker,
            "Committed {} entries",
            progress.progress
        );
        Ok(true)
    }

    /// Final commit at end of file, regardless of the batch boundary
    pub async fn finish<S: LoadStore + ?Sized>(&self, store: &mut S) -> IngestResult<()> {
        store.commit().await?;
        Ok(())
    }
}
