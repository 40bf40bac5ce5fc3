//! Integration tests for the sync engine
//!
//! These tests verify behaviour across modules:
//! - Id uniqueness under concurrent callers
//! - Partial fetch failure isolation
//! - Single claim of a task under concurrent pollers
//! - Task lifecycle driven by the poller
//! - Bounded concurrency of polled tasks
//! - Completion failures after a successful sync

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    identity::{IdentityResolver, PlayerIdentity},
    records::{PoolType, RecordPage, RecordSource, RemotePullRecord},
    time::SystemClock,
};
use core_library::db::{create_pool, create_test_pool, DatabaseConfig};
use core_library::repositories::{PullRecordRepository, SqlitePullRecordRepository};
use core_sync::{
    FetchPool, IdGenerator, SqliteSyncTaskRepository, SyncConfig, SyncCoordinator, SyncError,
    SyncTask, SyncTaskRepository, TaskId, TaskPoller, TaskRegistry, TaskStatus,
};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Fakes
// ============================================================================

struct FakeIdentity;

#[async_trait]
impl IdentityResolver for FakeIdentity {
    async fn resolve(&self, auth_token: &str) -> BridgeResult<PlayerIdentity> {
        match auth_token {
            "T" => Ok(PlayerIdentity {
                role_id: "P1".to_string(),
                uid: "10001".to_string(),
                nick_name: "Endmin".to_string(),
                capability_token: "u8-P1".to_string(),
            }),
            _ => Err(BridgeError::OperationFailed("token expired".to_string())),
        }
    }
}

/// Resolves like `FakeIdentity` after a delay, tracking how many
/// resolutions overlap.
#[derive(Default)]
struct SlowIdentity {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl IdentityResolver for SlowIdentity {
    async fn resolve(&self, auth_token: &str) -> BridgeResult<PlayerIdentity> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(40)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        FakeIdentity.resolve(auth_token).await
    }
}

/// Task store whose completion write always fails.
struct CompletionFailingTasks {
    inner: SqliteSyncTaskRepository,
}

#[async_trait]
impl SyncTaskRepository for CompletionFailingTasks {
    async fn insert(&self, task: &SyncTask) -> core_sync::Result<()> {
        self.inner.insert(task).await
    }

    async fn find_by_id(&self, task_id: &TaskId) -> core_sync::Result<Option<SyncTask>> {
        self.inner.find_by_id(task_id).await
    }

    async fn claim_next(&self, now_ms: i64) -> core_sync::Result<Option<SyncTask>> {
        self.inner.claim_next(now_ms).await
    }

    async fn mark_completed(
        &self,
        _task_id: &TaskId,
        _role_id: &str,
        _now_ms: i64,
    ) -> core_sync::Result<()> {
        Err(SyncError::Database("disk I/O error".to_string()))
    }
}

/// Every pool holds `per_pool` records in pages of five. Pools listed in
/// `failing` refuse every request.
struct FakeSource {
    per_pool: u64,
    failing: Vec<PoolType>,
}

fn pool_name(pool_type: PoolType) -> &'static str {
    match pool_type {
        PoolType::Special => "Scorching Fang",
        PoolType::Standard => "Basic Headhunting",
        PoolType::Beginner => "Beginner Headhunting",
    }
}

#[async_trait]
impl RecordSource for FakeSource {
    async fn fetch_page(
        &self,
        _capability_token: &str,
        pool_type: PoolType,
        cursor: Option<u64>,
    ) -> BridgeResult<RecordPage> {
        if self.failing.contains(&pool_type) {
            return Err(BridgeError::OperationFailed("connection reset".to_string()));
        }

        let start = cursor.map_or(self.per_pool, |c| c.saturating_sub(1));
        let records: Vec<RemotePullRecord> = (1..=start)
            .rev()
            .take(5)
            .map(|seq| RemotePullRecord {
                pool_id: format!("{:?}", pool_type).to_lowercase(),
                pool_name: pool_name(pool_type).to_string(),
                char_id: format!("chr_{}", seq),
                char_name: "Operator".to_string(),
                rarity: 4,
                is_free: false,
                is_new: seq == 1,
                gacha_ts: (1_716_000_000_000u64 + seq).to_string(),
                seq_id: seq.to_string(),
            })
            .collect();
        let has_more = records.last().is_some_and(|r| r.seq_id != "1");

        Ok(RecordPage {
            pool_type,
            lang: "zh-cn".to_string(),
            server_id: "1".to_string(),
            records,
            has_more,
        })
    }
}

struct Engine {
    pool: SqlitePool,
    registry: Arc<TaskRegistry>,
    coordinator: Arc<SyncCoordinator>,
}

async fn engine(source: FakeSource) -> Engine {
    let pool = create_test_pool().await.unwrap();
    let tasks = Arc::new(SqliteSyncTaskRepository::new(pool.clone()));
    engine_with(pool, source, Arc::new(FakeIdentity), tasks)
}

fn engine_with(
    pool: SqlitePool,
    source: FakeSource,
    identity: Arc<dyn IdentityResolver>,
    tasks: Arc<dyn SyncTaskRepository>,
) -> Engine {
    let clock = Arc::new(SystemClock);
    let ids = Arc::new(IdGenerator::new(3, clock.clone()).unwrap());

    let registry = Arc::new(TaskRegistry::with_repository(
        tasks,
        ids.clone(),
        clock,
        pool.clone(),
    ));
    let coordinator = Arc::new(SyncCoordinator::new(
        SyncConfig::default(),
        identity,
        Arc::new(source),
        Arc::new(FetchPool::new(4, 8).unwrap()),
        ids,
        registry.clone(),
        pool.clone(),
    ));

    Engine {
        pool,
        registry,
        coordinator,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_ids_unique_across_concurrent_callers() {
    let generator = Arc::new(IdGenerator::with_system_clock(1).unwrap());

    let mut handles = Vec::new();
    for _ in 0..8 {
        let generator = Arc::clone(&generator);
        handles.push(tokio::task::spawn_blocking(move || {
            (0..5_000)
                .map(|_| generator.next().unwrap())
                .collect::<Vec<_>>()
        }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
        let ids = handle.await.unwrap();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        for id in ids {
            assert!(id.parts().sequence <= 1023);
            assert!(seen.insert(id), "duplicate id {}", id);
        }
    }

    assert_eq!(seen.len(), 40_000);
}

#[tokio::test]
async fn test_failing_pool_does_not_abort_sync() {
    let engine = engine(FakeSource {
        per_pool: 12,
        failing: vec![PoolType::Standard],
    })
    .await;

    let report = engine.coordinator.run_sync("T").await.unwrap();

    assert_eq!(report.outcome.succeeded, 24);
    assert_eq!(report.outcome.fetch_errors.len(), 1);
    assert!(report.outcome.fetch_errors[0].contains("E_CharacterGachaPoolType_Standard"));

    let records = SqlitePullRecordRepository::new(engine.pool.clone());
    assert_eq!(
        records.max_seq_id("P1", PoolType::Standard).await.unwrap(),
        None
    );
    assert_eq!(
        records.max_seq_id("P1", PoolType::Beginner).await.unwrap(),
        Some(12)
    );
    assert_eq!(engine.coordinator.metrics().fetch_failures, 1);
}

#[tokio::test]
async fn test_resync_after_new_pulls_fetches_only_the_gap() {
    let engine = engine(FakeSource {
        per_pool: 12,
        failing: Vec::new(),
    })
    .await;
    engine.coordinator.run_sync("T").await.unwrap();

    let grown = SyncCoordinator::new(
        SyncConfig::default(),
        Arc::new(FakeIdentity),
        Arc::new(FakeSource {
            per_pool: 30,
            failing: Vec::new(),
        }),
        Arc::new(FetchPool::new(2, 2).unwrap()),
        Arc::new(IdGenerator::with_system_clock(4).unwrap()),
        engine.registry.clone(),
        engine.pool.clone(),
    );

    let report = grown.run_sync("T").await.unwrap();

    assert_eq!(report.outcome.succeeded, 3 * 18);
    assert!(report.outcome.duplicated <= 3 * 5);
    assert!(report.outcome.errors.is_empty());

    let records = SqlitePullRecordRepository::new(engine.pool.clone());
    assert_eq!(records.count_by_role("P1").await.unwrap(), 90);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_claim_under_concurrent_pollers() {
    let path = std::env::temp_dir().join(format!(
        "sync-claim-{}-{}.db",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let pool = create_pool(DatabaseConfig::new(&path).max_connections(4))
        .await
        .unwrap();
    let ids = Arc::new(IdGenerator::with_system_clock(1).unwrap());
    let registry = Arc::new(TaskRegistry::new(ids, Arc::new(SystemClock), pool.clone()));

    let task_id = registry.submit("T").await.unwrap();

    let mut claimers = Vec::new();
    for _ in 0..8 {
        let registry = Arc::clone(&registry);
        claimers.push(tokio::spawn(async move { registry.claim_next().await.unwrap() }));
    }

    let mut winners = Vec::new();
    for claimer in claimers {
        if let Some(task) = claimer.await.unwrap() {
            winners.push(task.task_id);
        }
    }

    assert_eq!(winners, vec![task_id]);

    pool.close().await;
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn test_poll_once_completes_task() {
    let engine = engine(FakeSource {
        per_pool: 7,
        failing: Vec::new(),
    })
    .await;
    let poller = TaskPoller::new(
        engine.registry.clone(),
        engine.coordinator.clone(),
        Duration::from_millis(10),
        2,
    );

    let task_id = engine.registry.submit("T").await.unwrap();
    assert_eq!(poller.poll_once().await.unwrap(), Some(task_id.clone()));
    assert_eq!(poller.poll_once().await.unwrap(), None);

    let snapshot = engine.registry.poll(&task_id).await.unwrap();
    assert_eq!(snapshot.status, TaskStatus::Completed);
    assert_eq!(snapshot.role_id.as_deref(), Some("P1"));
    assert_eq!(snapshot.profile.unwrap().uid, "10001");
}

#[tokio::test]
async fn test_failed_sync_leaves_task_started() {
    let engine = engine(FakeSource {
        per_pool: 7,
        failing: Vec::new(),
    })
    .await;
    let poller = TaskPoller::new(
        engine.registry.clone(),
        engine.coordinator.clone(),
        Duration::from_millis(10),
        2,
    );

    let task_id = engine.registry.submit("expired").await.unwrap();
    let err = poller.poll_once().await.unwrap_err();

    assert!(matches!(err, SyncError::IdentityResolution(_)));
    assert_eq!(
        engine.registry.status(&task_id).await.unwrap(),
        TaskStatus::Started
    );
    assert!(matches!(
        engine.registry.poll(&task_id).await,
        Err(SyncError::TaskNotCompleted { .. })
    ));
}

#[tokio::test]
async fn test_background_poller_drains_and_stops() {
    let engine = engine(FakeSource {
        per_pool: 6,
        failing: Vec::new(),
    })
    .await;
    let poller = Arc::new(TaskPoller::new(
        engine.registry.clone(),
        engine.coordinator.clone(),
        Duration::from_millis(10),
        2,
    ));

    let first = engine.registry.submit("T").await.unwrap();
    let second = engine.registry.submit("T").await.unwrap();

    let cancel = CancellationToken::new();
    let running = {
        let poller = Arc::clone(&poller);
        let cancel = cancel.clone();
        tokio::spawn(async move { poller.run(cancel).await })
    };

    let mut waited = Duration::ZERO;
    while engine.registry.status(&second).await.unwrap() != TaskStatus::Completed
        && waited < Duration::from_secs(5)
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    cancel.cancel();
    running.await.unwrap();

    assert_eq!(
        engine.registry.status(&first).await.unwrap(),
        TaskStatus::Completed
    );
    assert_eq!(
        engine.registry.status(&second).await.unwrap(),
        TaskStatus::Completed
    );

    let records = SqlitePullRecordRepository::new(engine.pool.clone());
    assert_eq!(records.count_by_role("P1").await.unwrap(), 18);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_poller_bounds_running_tasks() {
    let pool = create_test_pool().await.unwrap();
    let identity = Arc::new(SlowIdentity::default());
    let engine = engine_with(
        pool.clone(),
        FakeSource {
            per_pool: 3,
            failing: Vec::new(),
        },
        identity.clone(),
        Arc::new(SqliteSyncTaskRepository::new(pool)),
    );
    let poller = Arc::new(TaskPoller::new(
        engine.registry.clone(),
        engine.coordinator.clone(),
        Duration::from_millis(5),
        2,
    ));

    let mut submitted = Vec::new();
    for _ in 0..10 {
        submitted.push(engine.registry.submit("T").await.unwrap());
    }

    let cancel = CancellationToken::new();
    let running = {
        let poller = Arc::clone(&poller);
        let cancel = cancel.clone();
        tokio::spawn(async move { poller.run(cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(60)).await;
    let mut waiting = 0;
    let mut started = 0;
    for task_id in &submitted {
        match engine.registry.status(task_id).await.unwrap() {
            TaskStatus::Created => waiting += 1,
            TaskStatus::Started => started += 1,
            TaskStatus::Completed => {}
        }
    }
    assert!(started <= 2, "{} tasks claimed at once", started);
    assert!(waiting > 0);

    let last = submitted[submitted.len() - 1].clone();
    let mut waited = Duration::ZERO;
    while engine.registry.status(&last).await.unwrap() != TaskStatus::Completed
        && waited < Duration::from_secs(10)
    {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }

    cancel.cancel();
    running.await.unwrap();

    for task_id in &submitted {
        assert_eq!(
            engine.registry.status(task_id).await.unwrap(),
            TaskStatus::Completed
        );
    }
    assert!(identity.peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(engine.coordinator.metrics().tasks_completed, 10);
}

#[tokio::test]
async fn test_completion_failure_is_reported() {
    let pool = create_test_pool().await.unwrap();
    let tasks = Arc::new(CompletionFailingTasks {
        inner: SqliteSyncTaskRepository::new(pool.clone()),
    });
    let engine = engine_with(
        pool,
        FakeSource {
            per_pool: 4,
            failing: Vec::new(),
        },
        Arc::new(FakeIdentity),
        tasks,
    );
    let poller = TaskPoller::new(
        engine.registry.clone(),
        engine.coordinator.clone(),
        Duration::from_millis(10),
        2,
    );

    let task_id = engine.registry.submit("T").await.unwrap();
    let err = poller.poll_once().await.unwrap_err();

    assert!(matches!(err, SyncError::Database(_)));
    assert_eq!(
        engine.registry.status(&task_id).await.unwrap(),
        TaskStatus::Started
    );

    let records = SqlitePullRecordRepository::new(engine.pool.clone());
    assert_eq!(records.count_by_role("P1").await.unwrap(), 12);

    let metrics = engine.coordinator.metrics();
    assert_eq!(metrics.syncs_completed, 1);
    assert_eq!(metrics.tasks_unfinished, 1);
    assert_eq!(metrics.tasks_completed, 0);
}
