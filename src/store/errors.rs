//! Store error types.

use thiserror::Error;

/// Errors surfaced by the fast store, audit store, and promotion lock
/// providers. The engine maps these into `WaitroomError::StoreUnavailable`
/// at its boundary.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to reach the store backend
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    /// The backend rejected or failed an operation
    #[error("Store backend error: {0}")]
    BackendError(String),

    /// The backend returned data the engine cannot interpret
    #[error("Store data error: {0}")]
    DataError(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
