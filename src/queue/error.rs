//! Error types for the queue module

use thiserror::Error;

use crate::utils::error::UriError;

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

/// Queue-specific errors
#[derive(Error, Debug)]
pub enum QueueError {
    /// SQLite error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error while preparing the database location
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Table names are interpolated into SQL and must be plain identifiers
    #[error("Invalid table name \"{0}\"")]
    InvalidTableName(String),

    /// The job id is unknown to the queue
    #[error("Job ID \"{0}\" is invalid")]
    InvalidJobId(String),

    /// A stored row could not be turned back into a crawl URI
    #[error("Corrupt queue entry for job \"{job_id}\": {source}")]
    CorruptEntry {
        job_id: String,
        #[source]
        source: UriError,
    },

    /// A mutex guarding queue state was poisoned by a panicking thread
    #[error("Queue lock poisoned")]
    LockPoisoned,
}

impl QueueError {
    /// Busy and locked databases clear up on their own
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}

impl<T> From<std::sync::PoisonError<T>> for QueueError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::LockPoisoned
    }
}
