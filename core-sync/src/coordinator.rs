//! # Sync Coordinator
//!
//! Orchestrates one pull-history sync for one player.
//!
//! ## Overview
//!
//! The `SyncCoordinator` ties the other modules together to:
//! - Resolve the player and capability token via `IdentityResolver`
//! - Read the newest stored sequence per pool type
//! - Fetch each pool's first page and plan the remaining cursors
//! - Fan page fetches out on the shared `FetchPool`
//! - Merge pages in submission order and persist through `DedupPersister`
//! - Complete sync tasks through the `TaskRegistry`
//!
//! ## Workflow
//!
//! 1. Resolve identity (failure aborts the sync, nothing is stored)
//! 2. Read the newest stored sequence for every pool type
//! 3. Fetch the cursor-less first page of each pool type, in order
//! 4. Plan cursors from each first page's oldest sequence
//! 5. Submit every `(pool type, cursor)` fetch and wait for all of them
//! 6. Merge: pool type order, first page, then cursors newest first
//! 7. Persist, tally, report
//!
//! A failed fetch never stops its siblings; it is reported in
//! `BatchOutcome::fetch_errors` and contributes no records.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{SyncConfig, SyncCoordinator};
//!
//! let coordinator = SyncCoordinator::new(
//!     SyncConfig::default(),
//!     identity_resolver,
//!     record_source,
//!     fetch_pool,
//!     id_generator,
//!     task_registry,
//!     db_pool,
//! );
//!
//! let report = coordinator.run_sync(&auth_token).await?;
//! println!("{} new records", report.outcome.succeeded);
//! ```

use crate::{
    id_generator::IdGenerator,
    metrics::{MetricsSnapshot, SyncMetrics},
    persister::{BatchOutcome, DedupPersister},
    registry::TaskRegistry,
    task::SyncTask,
    window,
    worker_pool::{self, FetchHandle, FetchPool},
    Result, SyncError,
};
use bridge_traits::{
    error::Result as BridgeResult,
    identity::{IdentityResolver, PlayerIdentity},
    records::{PoolType, RecordPage, RecordSource},
};
use core_library::{
    models::NewPullRecord,
    repositories::{PullRecordRepository, SqlitePullRecordRepository},
};
use core_runtime::config::SyncSettings;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Sync coordinator configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records per remote page, used to step cursors
    pub page_size: u32,

    /// Records per atomic insert
    pub batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 5,
            batch_size: 200,
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            page_size: settings.page_size,
            batch_size: settings.batch_size,
        }
    }
}

/// What one sync did
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Resolved player; the capability token is not serialized
    pub identity: PlayerIdentity,
    pub outcome: BatchOutcome,
    pub pages_fetched: usize,
    pub records_fetched: usize,
    pub duration: Duration,
}

/// One pool type's share of a sync
struct PoolWork {
    pool_type: PoolType,
    first_page: RecordPage,
    cursors: Vec<u64>,
}

/// Sync coordinator for pull-history synchronization
pub struct SyncCoordinator {
    config: SyncConfig,
    identity: Arc<dyn IdentityResolver>,
    source: Arc<dyn RecordSource>,
    fetch_pool: Arc<FetchPool>,
    records: Arc<dyn PullRecordRepository>,
    registry: Arc<TaskRegistry>,
    persister: DedupPersister,
    metrics: Arc<SyncMetrics>,
}

impl SyncCoordinator {
    /// Create a coordinator storing into `db_pool`
    ///
    /// `fetch_pool` and `ids` are meant to be shared with everything else
    /// that fetches or generates ids in the process. Claimed tasks are
    /// completed through `registry`, the same one pollers claim from.
    pub fn new(
        config: SyncConfig,
        identity: Arc<dyn IdentityResolver>,
        source: Arc<dyn RecordSource>,
        fetch_pool: Arc<FetchPool>,
        ids: Arc<IdGenerator>,
        registry: Arc<TaskRegistry>,
        db_pool: SqlitePool,
    ) -> Self {
        let records: Arc<dyn PullRecordRepository> =
            Arc::new(SqlitePullRecordRepository::new(db_pool));
        let persister = DedupPersister::new(Arc::clone(&records), ids, config.batch_size);

        Self {
            config,
            identity,
            source,
            fetch_pool,
            records,
            registry,
            persister,
            metrics: Arc::new(SyncMetrics::new()),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Sync every pool type for the player behind `auth_token`
    ///
    /// # Errors
    ///
    /// - `IdentityResolution` if the auth token cannot be exchanged
    /// - `Database` if stored sequence ids cannot be read
    ///
    /// Fetch and per-record failures are not errors; they are reported in
    /// the returned outcome.
    #[instrument(skip(self, auth_token))]
    pub async fn run_sync(&self, auth_token: &str) -> Result<SyncReport> {
        self.metrics.sync_started();

        match self.sync(auth_token).await {
            Ok(report) => {
                self.metrics.sync_completed(&report.outcome);
                Ok(report)
            }
            Err(e) => {
                self.metrics.sync_failed();
                Err(e)
            }
        }
    }

    /// Run the sync for a claimed task, then complete it
    ///
    /// # Errors
    ///
    /// Any `run_sync` error, or a failure to complete the task afterwards.
    /// Either way the task is left started and counted as unfinished.
    #[instrument(skip(self, task), fields(task_id = %task.task_id))]
    pub async fn execute_task(&self, task: SyncTask) -> Result<SyncReport> {
        let report = match self.run_sync(&task.auth_token).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Sync task failed, leaving it started");
                self.metrics.task_unfinished();
                return Err(e);
            }
        };

        if let Err(e) = self.registry.complete(task, &report.identity).await {
            error!(
                role_id = %report.identity.role_id,
                inserted = report.outcome.succeeded,
                error = %e,
                "Records stored but task could not be completed, leaving it started"
            );
            self.metrics.task_unfinished();
            return Err(e);
        }

        self.metrics.task_completed();

        Ok(report)
    }

    async fn sync(&self, auth_token: &str) -> Result<SyncReport> {
        let started = Instant::now();

        let identity = self
            .identity
            .resolve(auth_token)
            .await
            .map_err(|e| SyncError::IdentityResolution(e.to_string()))?;
        let role_id = identity.role_id.clone();

        info!(role_id = %role_id, "Starting pull history sync");

        let local_newest = self.local_newest(&role_id).await?;
        let mut fetch_errors = Vec::new();

        let mut works = Vec::with_capacity(PoolType::ALL.len());
        for pool_type in PoolType::ALL {
            match self
                .source
                .fetch_page(&identity.capability_token, pool_type, None)
                .await
            {
                Ok(first_page) => {
                    let local = local_newest.get(&pool_type).copied().flatten();
                    let cursors = self.plan_cursors(&first_page, local, &mut fetch_errors);
                    debug!(
                        pool_type = %pool_type,
                        local_newest = ?local,
                        first_page_records = first_page.records.len(),
                        cursors = cursors.len(),
                        "Planned pool fetches"
                    );
                    works.push(PoolWork {
                        pool_type,
                        first_page,
                        cursors,
                    });
                }
                Err(e) => {
                    let error = SyncError::Fetch {
                        pool_type,
                        cursor: None,
                        message: e.to_string(),
                    };
                    warn!(error = %error, "First page fetch failed");
                    fetch_errors.push(error.to_string());
                }
            }
        }

        let handles = self.submit_fetches(&identity, &works).await;
        let mut fetched = worker_pool::join_all(handles).await.into_iter();

        let mut merged: Vec<NewPullRecord> = Vec::new();
        let mut pages_fetched = 0;

        for work in &works {
            merged.extend(NewPullRecord::from_page(&role_id, &work.first_page));
            pages_fetched += 1;

            for &cursor in &work.cursors {
                let Some(result) = fetched.next() else {
                    break;
                };

                let message = match result {
                    Ok(Ok(page)) => {
                        merged.extend(NewPullRecord::from_page(&role_id, &page));
                        pages_fetched += 1;
                        continue;
                    }
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => e.to_string(),
                };

                let error = SyncError::Fetch {
                    pool_type: work.pool_type,
                    cursor: Some(cursor),
                    message,
                };
                warn!(error = %error, "Page fetch failed");
                fetch_errors.push(error.to_string());
            }
        }

        let records_fetched = merged.len();
        let mut outcome = self.persister.persist(&merged).await;
        outcome.fetch_errors.extend(fetch_errors);

        let report = SyncReport {
            identity,
            outcome,
            pages_fetched,
            records_fetched,
            duration: started.elapsed(),
        };

        info!(
            role_id = %role_id,
            pages = report.pages_fetched,
            fetched = report.records_fetched,
            inserted = report.outcome.succeeded,
            duplicated = report.outcome.duplicated,
            failed = report.outcome.failed,
            fetch_errors = report.outcome.fetch_errors.len(),
            duration_ms = report.duration.as_millis() as u64,
            "Pull history sync finished"
        );

        Ok(report)
    }

    async fn local_newest(&self, role_id: &str) -> Result<HashMap<PoolType, Option<u64>>> {
        let mut newest = HashMap::with_capacity(PoolType::ALL.len());
        for pool_type in PoolType::ALL {
            newest.insert(pool_type, self.records.max_seq_id(role_id, pool_type).await?);
        }
        Ok(newest)
    }

    fn plan_cursors(
        &self,
        first_page: &RecordPage,
        local_newest: Option<u64>,
        fetch_errors: &mut Vec<String>,
    ) -> Vec<u64> {
        if first_page.is_empty() || !first_page.has_more {
            return Vec::new();
        }

        let Some(oldest) = first_page.oldest_seq_id() else {
            return Vec::new();
        };

        match window::plan(oldest, local_newest, self.config.page_size) {
            Ok(cursors) => cursors,
            Err(e) => {
                warn!(pool_type = %first_page.pool_type, error = %e, "Cannot plan pool fetches");
                fetch_errors.push(format!("{}: {}", first_page.pool_type, e));
                Vec::new()
            }
        }
    }

    async fn submit_fetches(
        &self,
        identity: &PlayerIdentity,
        works: &[PoolWork],
    ) -> Vec<FetchHandle<BridgeResult<RecordPage>>> {
        let mut handles = Vec::new();

        for work in works {
            for &cursor in &work.cursors {
                let source = Arc::clone(&self.source);
                let token = identity.capability_token.clone();
                let pool_type = work.pool_type;

                let fetch = async move { source.fetch_page(&token, pool_type, Some(cursor)).await };
                handles.push(self.fetch_pool.submit(fetch).await);
            }
        }

        handles
    }
}
