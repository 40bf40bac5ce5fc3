//! # Deduplicating Persister
//!
//! Writes merged pull records, relying on the store's natural-key constraint
//! to reject anything already stored.
//!
//! ## Workflow
//!
//! 1. Split records into batches of `batch_size`
//! 2. Give every record in the batch a fresh id
//! 3. Insert the batch atomically
//! 4. If the batch fails, insert its records one by one: duplicates are
//!    counted and skipped, other failures are counted with their message
//!
//! A clock regression while assigning ids stops persistence; the current
//! batch and everything after it are counted as failed.

use crate::id_generator::IdGenerator;
use core_library::models::{NewPullRecord, PullRecord};
use core_library::repositories::PullRecordRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Per-sync persistence tally
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Newly stored records
    pub succeeded: usize,
    /// Records rejected as already stored
    pub duplicated: usize,
    pub failed: usize,
    /// Messages for failed records
    pub errors: Vec<String>,
    /// Messages for fetches that gave up after retrying
    pub fetch_errors: Vec<String>,
}

impl BatchOutcome {
    /// Records handed to the persister
    pub fn total(&self) -> usize {
        self.succeeded + self.duplicated + self.failed
    }

    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.fetch_errors.is_empty()
    }
}

pub struct DedupPersister {
    records: Arc<dyn PullRecordRepository>,
    ids: Arc<IdGenerator>,
    batch_size: usize,
}

impl DedupPersister {
    /// A zero `batch_size` is treated as 1.
    pub fn new(
        records: Arc<dyn PullRecordRepository>,
        ids: Arc<IdGenerator>,
        batch_size: usize,
    ) -> Self {
        Self {
            records,
            ids,
            batch_size: batch_size.max(1),
        }
    }

    /// Store `records`, skipping the ones already stored
    ///
    /// Never fails as a whole; every problem is reflected in the outcome.
    #[instrument(
        skip(self, records),
        fields(records = records.len(), batch_size = self.batch_size)
    )]
    pub async fn persist(&self, records: &[NewPullRecord]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();

        if records.is_empty() {
            return outcome;
        }

        for (index, chunk) in records.chunks(self.batch_size).enumerate() {
            let batch = match self.assign_ids(chunk) {
                Ok(batch) => batch,
                Err(e) => {
                    let remaining = records.len() - index * self.batch_size;
                    warn!(error = %e, remaining, "Stopping persistence, id generation failed");
                    outcome.failed += remaining;
                    outcome.errors.push(e.to_string());
                    return outcome;
                }
            };

            match self.records.insert_batch(&batch).await {
                Ok(()) => {
                    debug!(batch = index, inserted = batch.len(), "Batch stored");
                    outcome.succeeded += batch.len();
                }
                Err(e) => {
                    debug!(
                        batch = index,
                        error = %e,
                        "Batch rejected, inserting records individually"
                    );
                    self.insert_individually(&batch, &mut outcome).await;
                }
            }
        }

        info!(
            succeeded = outcome.succeeded,
            duplicated = outcome.duplicated,
            failed = outcome.failed,
            "Persisted pull records"
        );

        outcome
    }

    fn assign_ids(&self, chunk: &[NewPullRecord]) -> crate::Result<Vec<PullRecord>> {
        chunk
            .iter()
            .map(|record| {
                let id = self.ids.next()?;
                Ok(record.with_id(id.as_i64(), id.parts().timestamp_ms))
            })
            .collect()
    }

    async fn insert_individually(&self, batch: &[PullRecord], outcome: &mut BatchOutcome) {
        for record in batch {
            match self.records.insert(record).await {
                Ok(()) => outcome.succeeded += 1,
                Err(e) if e.is_duplicate() => {
                    debug!(
                        role_id = %record.role_id,
                        pool_name = %record.pool_name,
                        seq_id = %record.seq_id,
                        "Skipping stored record"
                    );
                    outcome.duplicated += 1;
                }
                Err(e) => {
                    warn!(
                        pool_name = %record.pool_name,
                        seq_id = %record.seq_id,
                        error = %e,
                        "Failed to store record"
                    );
                    outcome.failed += 1;
                    outcome.errors.push(format!(
                        "{}/{}/{}: {}",
                        record.role_id, record.pool_name, record.seq_id, e
                    ));
                }
            }
        }
    }
}
