//! # Sync Task Repository
//!
//! Provides database persistence for sync tasks.
//!
//! ## Overview
//!
//! This repository handles:
//! - Recording submitted tasks
//! - Claiming the oldest unstarted task atomically
//! - Marking tasks completed with the resolved player
//! - Task lookup for polling

use crate::task::{SyncTask, TaskId};
use crate::{Result, SyncError};
use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};

// ============================================================================
// Repository Trait
// ============================================================================

/// Repository trait for sync task persistence
#[async_trait]
pub trait SyncTaskRepository: Send + Sync {
    /// Insert a new task
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the id exists
    async fn insert(&self, task: &SyncTask) -> Result<()>;

    /// Find a task by id
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails
    async fn find_by_id(&self, task_id: &TaskId) -> Result<Option<SyncTask>>;

    /// Claim the oldest unstarted task, marking it started
    ///
    /// The claim is a single conditional update, so concurrent callers can
    /// never both receive the same task.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if no task is waiting
    async fn claim_next(&self, now_ms: i64) -> Result<Option<SyncTask>>;

    /// Record the resolved player and mark a started task completed
    ///
    /// # Errors
    ///
    /// - `TaskNotFound` if no task has this id
    /// - `InvalidStateTransition` if the task was never started
    async fn mark_completed(&self, task_id: &TaskId, role_id: &str, now_ms: i64) -> Result<()>;
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of SyncTaskRepository
pub struct SqliteSyncTaskRepository {
    pool: SqlitePool,
}

impl SqliteSyncTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Database row representation of a sync task
#[derive(Debug, FromRow)]
struct SyncTaskRow {
    task_id: String,
    auth_token: String,
    role_id: Option<String>,
    started: bool,
    completed: bool,
    created_at: i64,
    updated_at: Option<i64>,
}

impl TryFrom<SyncTaskRow> for SyncTask {
    type Error = SyncError;

    fn try_from(row: SyncTaskRow) -> Result<Self> {
        let task = SyncTask {
            task_id: TaskId::new(row.task_id),
            auth_token: row.auth_token,
            role_id: row.role_id,
            started: row.started,
            completed: row.completed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };

        // Reject rows whose flags do not form a valid state
        task.status()?;

        Ok(task)
    }
}

#[async_trait]
impl SyncTaskRepository for SqliteSyncTaskRepository {
    async fn insert(&self, task: &SyncTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_tasks (
                task_id, auth_token, role_id, started, completed, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.task_id.as_str())
        .bind(&task.auth_token)
        .bind(&task.role_id)
        .bind(task.started)
        .bind(task.completed)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
                SyncError::DuplicateKey {
                    entity_type: "SyncTask".to_string(),
                    key: task.task_id.to_string(),
                }
            }
            _ => SyncError::Database(e.to_string()),
        })?;

        Ok(())
    }

    async fn find_by_id(&self, task_id: &TaskId) -> Result<Option<SyncTask>> {
        let row = sqlx::query_as::<_, SyncTaskRow>(
            r#"
            SELECT task_id, auth_token, role_id, started, completed, created_at, updated_at
            FROM sync_tasks
            WHERE task_id = ?
            "#,
        )
        .bind(task_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(SyncTask::try_from).transpose()
    }

    async fn claim_next(&self, now_ms: i64) -> Result<Option<SyncTask>> {
        let rows = sqlx::query_as::<_, SyncTaskRow>(
            r#"
            UPDATE sync_tasks
            SET started = 1, updated_at = ?
            WHERE task_id = (
                SELECT task_id FROM sync_tasks
                WHERE started = 0
                ORDER BY created_at ASC, rowid ASC
                LIMIT 1
            )
            AND started = 0
            RETURNING task_id, auth_token, role_id, started, completed, created_at, updated_at
            "#,
        )
        .bind(now_ms)
        .fetch_all(&self.pool)
        .await?;

        // At most one row; run the statement to completion before reading it
        rows.into_iter().next().map(SyncTask::try_from).transpose()
    }

    async fn mark_completed(&self, task_id: &TaskId, role_id: &str, now_ms: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE sync_tasks
            SET completed = 1, role_id = ?, updated_at = ?
            WHERE task_id = ? AND started = 1
            "#,
        )
        .bind(role_id)
        .bind(now_ms)
        .bind(task_id.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.find_by_id(task_id).await? {
                None => Err(SyncError::TaskNotFound {
                    task_id: task_id.to_string(),
                }),
                Some(_) => Err(SyncError::InvalidStateTransition {
                    from: "created".to_string(),
                    to: "completed".to_string(),
                    reason: "task has not been started".to_string(),
                }),
            };
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
