use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Duplicate {entity_type}: {key}")]
    DuplicateKey { entity_type: String, key: String },

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl LibraryError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, LibraryError::DuplicateKey { .. })
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
