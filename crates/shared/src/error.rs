//! Error types for the job queue store.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// `pop_front` was called on an empty queue. Callers check `len()` first.
    #[error("Job queue is empty")]
    Empty,

    #[error("Job queue persistence failed: {0}")]
    Persistence(#[from] rusqlite::Error),
}

/// Result type alias for queue operations
pub type QueueResult<T> = std::result::Result<T, QueueError>;
