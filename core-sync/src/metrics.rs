//! Sync counters shared by every run of a coordinator.

use crate::persister::BatchOutcome;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct SyncMetrics {
    records_inserted: AtomicU64,
    records_duplicated: AtomicU64,
    records_failed: AtomicU64,
    fetch_failures: AtomicU64,
    syncs_completed: AtomicU64,
    syncs_failed: AtomicU64,
    active_syncs: AtomicU64,
    tasks_completed: AtomicU64,
    tasks_unfinished: AtomicU64,
}

/// Point-in-time copy of [`SyncMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub records_inserted: u64,
    pub records_duplicated: u64,
    pub records_failed: u64,
    pub fetch_failures: u64,
    pub syncs_completed: u64,
    pub syncs_failed: u64,
    pub active_syncs: u64,
    pub tasks_completed: u64,
    /// Claimed tasks left started because their sync or completion failed
    pub tasks_unfinished: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn sync_started(&self) {
        self.active_syncs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn sync_completed(&self, outcome: &BatchOutcome) {
        self.records_inserted
            .fetch_add(outcome.succeeded as u64, Ordering::Relaxed);
        self.records_duplicated
            .fetch_add(outcome.duplicated as u64, Ordering::Relaxed);
        self.records_failed
            .fetch_add(outcome.failed as u64, Ordering::Relaxed);
        self.fetch_failures
            .fetch_add(outcome.fetch_errors.len() as u64, Ordering::Relaxed);
        self.syncs_completed.fetch_add(1, Ordering::Relaxed);
        self.active_syncs.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn sync_failed(&self) {
        self.syncs_failed.fetch_add(1, Ordering::Relaxed);
        self.active_syncs.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn task_completed(&self) {
        self.tasks_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn task_unfinished(&self) {
        self.tasks_unfinished.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_inserted: self.records_inserted.load(Ordering::Relaxed),
            records_duplicated: self.records_duplicated.load(Ordering::Relaxed),
            records_failed: self.records_failed.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            syncs_completed: self.syncs_completed.load(Ordering::Relaxed),
            syncs_failed: self.syncs_failed.load(Ordering::Relaxed),
            active_syncs: self.active_syncs.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_unfinished: self.tasks_unfinished.load(Ordering::Relaxed),
        }
    }
}
