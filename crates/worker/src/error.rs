//! Worker error types.

use domain::DomainError;
use queue::QueueError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by intake and the order processor.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The submission failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] DomainError),

    /// A store operation failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Enqueueing the processing job failed. The pending order is left in
    /// place; the operator tooling is the recovery path.
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    /// A job payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
