use bridge_traits::records::PoolType;
use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Clock moved backwards: last {last_ms} ms, now {now_ms} ms")]
    ClockRegressed { last_ms: i64, now_ms: i64 },

    #[error("Invalid sequence id: {0:?}")]
    InvalidSequence(String),

    #[error("Fetch failed for {pool_type} at cursor {cursor:?}: {message}")]
    Fetch {
        pool_type: PoolType,
        cursor: Option<u64>,
        message: String,
    },

    #[error("Duplicate {entity_type}: {key}")]
    DuplicateKey { entity_type: String, key: String },

    #[error("Sync task {task_id} not found")]
    TaskNotFound { task_id: String },

    #[error("Sync task {task_id} has not completed")]
    TaskNotCompleted { task_id: String },

    #[error("Identity resolution failed: {0}")]
    IdentityResolution(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl From<LibraryError> for SyncError {
    fn from(error: LibraryError) -> Self {
        match error {
            LibraryError::DuplicateKey { entity_type, key } => {
                SyncError::DuplicateKey { entity_type, key }
            }
            LibraryError::InvalidInput { field, message } => {
                SyncError::InvalidInput { field, message }
            }
            other => SyncError::Database(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(error: sqlx::Error) -> Self {
        SyncError::Database(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
