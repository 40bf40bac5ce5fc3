//! # Repository Pattern Implementation
//!
//! Repository traits and SQLite implementations for data access.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - SQLite implementations use sqlx for async database access
//! - All operations return `Result<T>` for error handling
//!
//! ## Available Repositories
//!
//! - `PullRecordRepository` - Pull history with constraint-based dedup
//! - `PlayerProfileRepository` - Players seen by completed syncs

pub mod player_profile;
pub mod pull_record;

pub use player_profile::{PlayerProfileRepository, SqlitePlayerProfileRepository};
pub use pull_record::{PullRecordRepository, SqlitePullRecordRepository};

use crate::error::LibraryError;

/// Map an insert failure, turning unique violations into `DuplicateKey`.
pub(crate) fn map_insert_error(error: sqlx::Error, entity_type: &str, key: String) -> LibraryError {
    match &error {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            LibraryError::DuplicateKey {
                entity_type: entity_type.to_string(),
                key,
            }
        }
        _ => LibraryError::Database(error),
    }
}
