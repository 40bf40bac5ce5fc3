//! # Sync Task State Machine
//!
//! A sync task is one submitted sync request, persisted so a poller can pick
//! it up and so callers can ask whether it has finished.
//!
//! ## State Machine
//!
//! ```text
//! Created → Started → Completed
//! ```
//!
//! There is no failed or cancelled state: a task whose sync fails stays
//! `Started` and polls as not completed.

use crate::id_generator::UniqueId;
use crate::{Result, SyncError};
use core_library::models::PlayerProfile;
use core_runtime::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ID Types
// ============================================================================

/// Task identifier, `"task"` followed by a generated id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    const PREFIX: &'static str = "task";

    pub fn from_unique_id(id: UniqueId) -> Self {
        Self(format!("{}{}", Self::PREFIX, id))
    }

    /// Wrap an id received from a caller. Unknown ids are only detected on lookup.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ============================================================================
// Status Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Submitted, waiting for a poller
    Created,
    /// Claimed by a poller
    Started,
    Completed,
}

impl TaskStatus {
    /// Status encoded by the `started` / `completed` columns
    ///
    /// # Errors
    ///
    /// `InvalidStateTransition` for completed-but-not-started rows
    pub fn from_flags(started: bool, completed: bool) -> Result<Self> {
        match (started, completed) {
            (false, false) => Ok(TaskStatus::Created),
            (true, false) => Ok(TaskStatus::Started),
            (true, true) => Ok(TaskStatus::Completed),
            (false, true) => Err(SyncError::InvalidStateTransition {
                from: TaskStatus::Created.as_str().to_string(),
                to: TaskStatus::Completed.as_str().to_string(),
                reason: "task completed without being started".to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Started => "started",
            TaskStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Sync Task Entity
// ============================================================================

/// A persisted sync request
#[derive(Clone, PartialEq, Eq)]
pub struct SyncTask {
    pub task_id: TaskId,
    /// Caller's auth token, exchanged for an identity when the task runs
    pub auth_token: String,
    /// Player resolved by the sync, set on completion
    pub role_id: Option<String>,
    pub started: bool,
    pub completed: bool,
    /// Epoch milliseconds
    pub created_at: i64,
    pub updated_at: Option<i64>,
}

impl SyncTask {
    pub fn new(task_id: TaskId, auth_token: impl Into<String>, now_ms: i64) -> Self {
        Self {
            task_id,
            auth_token: auth_token.into(),
            role_id: None,
            started: false,
            completed: false,
            created_at: now_ms,
            updated_at: None,
        }
    }

    pub fn status(&self) -> Result<TaskStatus> {
        TaskStatus::from_flags(self.started, self.completed)
    }

    /// Claiming is a conditional update in the task store, so this is the
    /// only transition made in memory.
    ///
    /// # Errors
    ///
    /// Returns an error unless the task is `Started`
    pub fn complete(mut self, role_id: impl Into<String>, now_ms: i64) -> Result<Self> {
        self.validate_transition(TaskStatus::Completed)?;
        self.completed = true;
        self.role_id = Some(role_id.into());
        self.updated_at = Some(now_ms);
        Ok(self)
    }

    fn validate_transition(&self, to: TaskStatus) -> Result<()> {
        let from = self.status()?;
        let valid = matches!(
            (from, to),
            (TaskStatus::Created, TaskStatus::Started)
                | (TaskStatus::Started, TaskStatus::Completed)
        );

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!("Cannot transition from {} to {}", from, to),
            });
        }

        Ok(())
    }
}

impl fmt::Debug for SyncTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncTask")
            .field("task_id", &self.task_id)
            .field("auth_token", &redact_if_sensitive("auth_token", &self.auth_token))
            .field("role_id", &self.role_id)
            .field("started", &self.started)
            .field("completed", &self.completed)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// What a poll returns for a completed task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub role_id: Option<String>,
    pub profile: Option<PlayerProfile>,
}
