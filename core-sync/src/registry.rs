//! # Task Registry
//!
//! Accepts sync requests, hands them to pollers and answers status polls.

use crate::{
    id_generator::IdGenerator,
    repository::{SqliteSyncTaskRepository, SyncTaskRepository},
    task::{SyncTask, TaskId, TaskSnapshot, TaskStatus},
    Result, SyncError,
};
use bridge_traits::{identity::PlayerIdentity, time::Clock};
use core_library::models::PlayerProfile;
use core_library::repositories::{PlayerProfileRepository, SqlitePlayerProfileRepository};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub struct TaskRegistry {
    tasks: Arc<dyn SyncTaskRepository>,
    profiles: Arc<dyn PlayerProfileRepository>,
    ids: Arc<IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl TaskRegistry {
    pub fn new(ids: Arc<IdGenerator>, clock: Arc<dyn Clock>, db_pool: SqlitePool) -> Self {
        let tasks = Arc::new(SqliteSyncTaskRepository::new(db_pool.clone()));
        Self::with_repository(tasks, ids, clock, db_pool)
    }

    /// Registry over an existing task store; profiles are kept in `db_pool`
    pub fn with_repository(
        tasks: Arc<dyn SyncTaskRepository>,
        ids: Arc<IdGenerator>,
        clock: Arc<dyn Clock>,
        db_pool: SqlitePool,
    ) -> Self {
        Self {
            tasks,
            profiles: Arc::new(SqlitePlayerProfileRepository::new(db_pool)),
            ids,
            clock,
        }
    }

    /// Record a sync request
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for a blank auth token
    /// - `ClockRegressed` if no task id can be generated
    #[instrument(skip(self, auth_token))]
    pub async fn submit(&self, auth_token: &str) -> Result<TaskId> {
        if auth_token.trim().is_empty() {
            return Err(SyncError::InvalidInput {
                field: "auth_token".to_string(),
                message: "cannot be empty".to_string(),
            });
        }

        let task_id = TaskId::from_unique_id(self.ids.next()?);
        let task = SyncTask::new(task_id.clone(), auth_token, self.clock.unix_timestamp_millis());
        self.tasks.insert(&task).await?;

        info!(task_id = %task_id, "Sync task submitted");

        Ok(task_id)
    }

    /// # Errors
    ///
    /// `TaskNotFound` if no task has this id
    pub async fn find(&self, task_id: &TaskId) -> Result<SyncTask> {
        self.tasks
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| SyncError::TaskNotFound {
                task_id: task_id.to_string(),
            })
    }

    /// Current status, whatever it is
    pub async fn status(&self, task_id: &TaskId) -> Result<TaskStatus> {
        self.find(task_id).await?.status()
    }

    /// Result of a completed task
    ///
    /// # Errors
    ///
    /// - `TaskNotFound` if no task has this id
    /// - `TaskNotCompleted` while the task is created or started
    pub async fn poll(&self, task_id: &TaskId) -> Result<TaskSnapshot> {
        let task = self.find(task_id).await?;
        let status = task.status()?;

        if status != TaskStatus::Completed {
            debug!(task_id = %task_id, status = %status, "Polled unfinished task");
            return Err(SyncError::TaskNotCompleted {
                task_id: task_id.to_string(),
            });
        }

        let profile = match &task.role_id {
            Some(role_id) => self.profiles.find_by_role(role_id).await?,
            None => None,
        };

        Ok(TaskSnapshot {
            task_id: task.task_id,
            status,
            role_id: task.role_id,
            profile,
        })
    }

    /// Claim the oldest waiting task
    pub async fn claim_next(&self) -> Result<Option<SyncTask>> {
        let claimed = self
            .tasks
            .claim_next(self.clock.unix_timestamp_millis())
            .await?;

        if let Some(task) = &claimed {
            debug!(task_id = %task.task_id, "Claimed sync task");
        }

        Ok(claimed)
    }

    /// Complete a claimed task with the player its sync resolved
    ///
    /// The player's profile is stored first, so a completed task always
    /// polls with one.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` unless `task` is started
    /// - `Database` if the profile or the task cannot be written
    #[instrument(skip(self, task, identity), fields(task_id = %task.task_id))]
    pub async fn complete(&self, task: SyncTask, identity: &PlayerIdentity) -> Result<SyncTask> {
        let now_ms = self.clock.unix_timestamp_millis();
        let task = task.complete(&identity.role_id, now_ms)?;

        let profile = PlayerProfile {
            role_id: identity.role_id.clone(),
            uid: identity.uid.clone(),
            nick_name: identity.nick_name.clone(),
            created_at: now_ms,
        };
        if self.profiles.insert_if_absent(&profile).await? {
            debug!(role_id = %profile.role_id, "Stored new player profile");
        }

        self.tasks
            .mark_completed(&task.task_id, &identity.role_id, now_ms)
            .await?;

        info!(role_id = %identity.role_id, "Sync task completed");

        Ok(task)
    }
}
