//! Core service façade and bootstrap helpers.
//!
//! This crate wires the validated [`CoreConfig`] into a running sync engine:
//! the record database, the Endfield connector and identity resolver, the
//! shared fetch pool, the coordinator, the task registry and the poller.
//! Desktop hosts typically enable the `desktop-shims` feature so the default
//! reqwest HTTP client is used when none is injected.
//!
//! ```ignore
//! use core_runtime::CoreConfig;
//! use core_service::GachaSyncService;
//!
//! let config = CoreConfig::builder().database_path("records.db").build()?;
//! let service = GachaSyncService::bootstrap(config).await?;
//! let poller = service.start_poller();
//!
//! let task_id = service.submit_sync(&auth_token).await?;
//! // ... later
//! let snapshot = service.poll_task(task_id.as_str()).await?;
//! let records = service.list_records_for_task(task_id.as_str()).await?;
//!
//! poller.shutdown().await?;
//! ```

pub mod error;

pub use error::{CoreError, Result};

pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
pub use core_runtime::{CoreConfig, CoreConfigBuilder};

use std::sync::Arc;

use bridge_traits::time::{Clock, SystemClock};
use core_library::db::{create_pool, DatabaseConfig};
use core_library::models::PullRecord;
use core_library::repositories::{PullRecordRepository, SqlitePullRecordRepository};
use core_sync::{
    FetchPool, IdGenerator, MetricsSnapshot, SyncConfig, SyncCoordinator, SyncError, SyncReport,
    TaskId, TaskPoller, TaskRegistry, TaskSnapshot, TaskStatus,
};
use provider_endfield::{EndfieldConnector, TokenServiceIdentityResolver};
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

struct ServiceInner {
    config: CoreConfig,
    db_pool: SqlitePool,
    records: Arc<dyn PullRecordRepository>,
    registry: Arc<TaskRegistry>,
    coordinator: Arc<SyncCoordinator>,
    poller: Arc<TaskPoller>,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct GachaSyncService {
    inner: Arc<ServiceInner>,
}

impl GachaSyncService {
    /// Validate `config` and build every engine component.
    ///
    /// Opens (or creates) the database and applies migrations.
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let db_config = if config.is_in_memory() {
            DatabaseConfig::in_memory()
        } else {
            DatabaseConfig::new(&config.database_path)
        };
        let db_pool = create_pool(db_config).await?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let ids = Arc::new(IdGenerator::new(config.node_id, Arc::clone(&clock))?);

        let source = Arc::new(EndfieldConnector::new(
            Arc::clone(&config.http_client),
            config.api.clone(),
            config.sync.fetch_retry.clone(),
        ));
        let identity = Arc::new(TokenServiceIdentityResolver::new(
            Arc::clone(&config.http_client),
            config.api.clone(),
        ));
        let fetch_pool = Arc::new(FetchPool::new(
            config.sync.max_workers,
            config.sync.queue_capacity,
        )?);

        let registry = Arc::new(TaskRegistry::new(Arc::clone(&ids), clock, db_pool.clone()));
        let coordinator = Arc::new(SyncCoordinator::new(
            SyncConfig::from(&config.sync),
            identity,
            source,
            fetch_pool,
            ids,
            Arc::clone(&registry),
            db_pool.clone(),
        ));
        let poller = Arc::new(TaskPoller::new(
            Arc::clone(&registry),
            Arc::clone(&coordinator),
            config.sync.poll_interval,
            config.sync.max_concurrent_syncs,
        ));

        info!(
            node_id = config.node_id,
            in_memory = config.is_in_memory(),
            max_workers = config.sync.max_workers,
            max_concurrent_syncs = config.sync.max_concurrent_syncs,
            "Gacha sync service ready"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                records: Arc::new(SqlitePullRecordRepository::new(db_pool.clone())),
                config,
                db_pool,
                registry,
                coordinator,
                poller,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    /// Queue a sync for the player behind `auth_token`.
    pub async fn submit_sync(&self, auth_token: &str) -> Result<TaskId> {
        Ok(self.inner.registry.submit(auth_token).await?)
    }

    /// Result of a completed task.
    ///
    /// Fails with `TaskNotFound` for unknown ids and `TaskNotCompleted` while
    /// the task is waiting or running.
    pub async fn poll_task(&self, task_id: &str) -> Result<TaskSnapshot> {
        Ok(self.inner.registry.poll(&TaskId::from(task_id)).await?)
    }

    pub async fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        Ok(self.inner.registry.status(&TaskId::from(task_id)).await?)
    }

    /// Stored pulls of a player, grouped by pool type, newest first.
    pub async fn list_records(&self, role_id: &str) -> Result<Vec<PullRecord>> {
        Ok(self.inner.records.find_by_role(role_id).await?)
    }

    /// Stored pulls of the player a completed task synced.
    pub async fn list_records_for_task(&self, task_id: &str) -> Result<Vec<PullRecord>> {
        let snapshot = self.poll_task(task_id).await?;
        let role_id = snapshot.role_id.ok_or_else(|| SyncError::TaskNotCompleted {
            task_id: task_id.to_string(),
        })?;

        self.list_records(&role_id).await
    }

    /// Sync on the calling task without creating a sync task.
    pub async fn run_sync_now(&self, auth_token: &str) -> Result<SyncReport> {
        Ok(self.inner.coordinator.run_sync(auth_token).await?)
    }

    /// Claim and run one waiting task, for hosts that drive their own schedule.
    pub async fn poll_once(&self) -> Result<Option<TaskId>> {
        Ok(self.inner.poller.poll_once().await?)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.coordinator.metrics()
    }

    /// Run the task poller in the background until the handle is shut down.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_poller(&self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let poller = Arc::clone(&self.inner.poller);
        let token = cancel.clone();

        PollerHandle {
            cancel,
            handle: tokio::spawn(async move { poller.run(token).await }),
        }
    }

    /// Close the database pool. Outstanding clones of the service stop working.
    pub async fn close(&self) {
        self.inner.db_pool.close().await;
    }
}

/// Running background poller.
pub struct PollerHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop claiming tasks and wait for syncs already running.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.handle
            .await
            .map_err(|e| CoreError::Join(e.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
