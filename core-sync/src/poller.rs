//! # Task Poller
//!
//! Background loop that claims submitted sync tasks and runs them.
//!
//! Each claimed task runs on its own spawned task so a slow sync does not
//! hold up the next claim. At most `max_concurrent` claimed tasks run at
//! once: a permit is taken before claiming, so tasks beyond that stay
//! `Created` in the store instead of piling up as started. When nothing is
//! waiting the loop sleeps for the poll interval. Cancelling the loop stops
//! claiming and waits for the syncs already running.

use crate::{
    coordinator::SyncCoordinator, registry::TaskRegistry, task::TaskId, Result, SyncError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct TaskPoller {
    registry: Arc<TaskRegistry>,
    coordinator: Arc<SyncCoordinator>,
    poll_interval: Duration,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl TaskPoller {
    /// `max_concurrent` is clamped to at least one.
    pub fn new(
        registry: Arc<TaskRegistry>,
        coordinator: Arc<SyncCoordinator>,
        poll_interval: Duration,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            registry,
            coordinator,
            poll_interval,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Poll until `cancel` fires, then wait for running syncs
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            max_concurrent = self.max_concurrent,
            "Task poller started"
        );

        let mut running = JoinSet::new();

        while !cancel.is_cancelled() {
            while let Some(joined) = running.try_join_next() {
                if let Err(e) = joined {
                    error!(error = %e, "Sync task panicked");
                }
            }

            let permit = tokio::select! {
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            match self.registry.claim_next().await {
                Ok(Some(task)) => {
                    let coordinator = Arc::clone(&self.coordinator);
                    running.spawn(async move {
                        let _permit = permit;
                        let task_id = task.task_id.clone();
                        match coordinator.execute_task(task).await {
                            Ok(report) => debug!(
                                task_id = %task_id,
                                inserted = report.outcome.succeeded,
                                "Polled sync task finished"
                            ),
                            Err(e) => warn!(
                                task_id = %task_id,
                                error = %e,
                                "Polled sync task did not complete"
                            ),
                        }
                    });
                    continue;
                }
                Ok(None) => drop(permit),
                Err(e) => {
                    drop(permit);
                    warn!(error = %e, "Failed to claim sync task");
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }

        info!(running = running.len(), "Task poller stopping");

        while let Some(joined) = running.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Sync task panicked");
            }
        }
    }

    /// Claim and run at most one task on the calling task
    ///
    /// Shares the permit budget with [`TaskPoller::run`].
    ///
    /// # Returns
    ///
    /// The id of the task that ran, `None` if nothing was waiting
    ///
    /// # Errors
    ///
    /// Errors from claiming, from the sync itself, or from completing the task
    pub async fn poll_once(&self) -> Result<Option<TaskId>> {
        let _permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| SyncError::Worker(e.to_string()))?;

        let Some(task) = self.registry.claim_next().await? else {
            return Ok(None);
        };

        let task_id = task.task_id.clone();
        self.coordinator.execute_task(task).await?;

        Ok(Some(task_id))
    }
}
