//! Error types for the Endfield provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Endfield provider errors
#[derive(Error, Debug)]
pub enum EndfieldError {
    /// Remote answered with a non-success HTTP status
    #[error("Endfield API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Token service rejected the token or returned no usable identity
    #[error("Identity resolution failed: {0}")]
    IdentityError(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// Result type for Endfield operations
pub type Result<T> = std::result::Result<T, EndfieldError>;

impl From<EndfieldError> for BridgeError {
    fn from(error: EndfieldError) -> Self {
        match error {
            EndfieldError::ApiError {
                status_code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}): {}",
                status_code, message
            )),
            EndfieldError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            EndfieldError::IdentityError(msg) => {
                BridgeError::OperationFailed(format!("Identity resolution failed: {}", msg))
            }
            EndfieldError::Bridge(e) => e,
        }
    }
}
