//! # Fetch Pool
//!
//! Bounded pool shared by every sync for remote page fetches.
//!
//! At most `max_workers` fetches run at once and at most `queue_capacity`
//! more wait for a worker. A submission beyond that runs on the submitting
//! task itself, so a saturated pool slows the caller down instead of
//! rejecting work or queueing without bound.

use crate::{Result, SyncError};
use futures::future;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct FetchPool {
    /// Running fetches
    workers: Arc<Semaphore>,
    /// Running plus waiting fetches
    admission: Arc<Semaphore>,
    max_workers: usize,
    queue_capacity: usize,
}

/// Result of [`FetchPool::submit`]
pub enum FetchHandle<T> {
    /// Running on the pool
    Spawned(JoinHandle<T>),
    /// Already ran on the caller because the pool was saturated
    Completed(T),
}

impl<T> FetchHandle<T> {
    pub fn ran_on_caller(&self) -> bool {
        matches!(self, FetchHandle::Completed(_))
    }

    /// Wait for the fetch to finish
    ///
    /// # Errors
    ///
    /// `Worker` if the spawned task panicked or was aborted
    pub async fn join(self) -> Result<T> {
        match self {
            FetchHandle::Spawned(handle) => handle
                .await
                .map_err(|e| SyncError::Worker(e.to_string())),
            FetchHandle::Completed(value) => Ok(value),
        }
    }
}

impl FetchPool {
    /// # Errors
    ///
    /// `InvalidInput` if `max_workers` is zero
    pub fn new(max_workers: usize, queue_capacity: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(SyncError::InvalidInput {
                field: "max_workers".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            workers: Arc::new(Semaphore::new(max_workers)),
            admission: Arc::new(Semaphore::new(max_workers + queue_capacity)),
            max_workers,
            queue_capacity,
        })
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Fetches admitted and not yet finished
    pub fn in_flight(&self) -> usize {
        self.max_workers + self.queue_capacity - self.admission.available_permits()
    }

    /// Submit a fetch
    ///
    /// Spawns onto the pool when there is room; otherwise awaits `task` on
    /// the calling task before returning.
    pub async fn submit<F, T>(&self, task: F) -> FetchHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        match Arc::clone(&self.admission).try_acquire_owned() {
            Ok(slot) => {
                let workers = Arc::clone(&self.workers);
                FetchHandle::Spawned(tokio::spawn(async move {
                    // The semaphores are never closed
                    let worker = workers.acquire_owned().await.ok();
                    let output = task.await;
                    drop(worker);
                    drop(slot);
                    output
                }))
            }
            Err(_) => {
                debug!(
                    max_workers = self.max_workers,
                    queue_capacity = self.queue_capacity,
                    "Fetch pool saturated, running fetch on caller"
                );
                FetchHandle::Completed(task.await)
            }
        }
    }
}

impl std::fmt::Debug for FetchPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchPool")
            .field("max_workers", &self.max_workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Await every handle, keeping submission order
pub async fn join_all<T>(handles: Vec<FetchHandle<T>>) -> Vec<Result<T>> {
    future::join_all(handles.into_iter().map(FetchHandle::join)).await
}
