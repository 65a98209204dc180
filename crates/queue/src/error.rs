use common::JobId;
use thiserror::Error;

/// Errors that can occur when interacting with the queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The referenced job does not exist (or was evicted by retention).
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    /// A database error occurred in the durable job store.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for queue operations.
pub type Result<T> = std::result::Result<T, QueueError>;
