//! Error types for the waiting room engine.

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

/// Top-level error taxonomy for queue operations.
///
/// `NotEnterable` deliberately carries no detail: the admission gate
/// collapses every negative or uncertain verdict into it so the protected
/// flow cannot branch on queue internals.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WaitroomError {
    #[error("Queue {queue_id} not found")]
    QueueNotFound { queue_id: Uuid },
    #[error("User {user_id} is already waiting or admitted in queue {queue_id}")]
    AlreadyInQueue { queue_id: Uuid, user_id: Uuid },
    #[error("User {user_id} has no membership in queue {queue_id}")]
    NotInQueue { queue_id: Uuid, user_id: Uuid },
    #[error("Not enterable")]
    NotEnterable,
    #[error("Invalid admission state: {0}")]
    InvalidAdmissionState(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Fatal store inconsistency, manual reconciliation required: {0}")]
    FatalInconsistency(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl From<StoreError> for WaitroomError {
    fn from(err: StoreError) -> Self {
        WaitroomError::StoreUnavailable(err.to_string())
    }
}

impl From<sqlx::Error> for WaitroomError {
    fn from(err: sqlx::Error) -> Self {
        WaitroomError::StoreUnavailable(format!("audit store error: {err}"))
    }
}

impl From<serde_json::Error> for WaitroomError {
    fn from(err: serde_json::Error) -> Self {
        WaitroomError::InvalidAdmissionState(format!("JSON serialization error: {err}"))
    }
}

pub type Result<T> = anyhow::Result<T, WaitroomError>;
