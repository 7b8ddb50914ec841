//! Error types for memory operations.

/// Errors returned by the session memory facade.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// The supplied conversation was rejected before any mutation.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The entry log failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    /// The summarizer failed while compacting a run.
    #[error("summarization error: {0}")]
    Summarization(#[from] SummarizerError),
}

/// Errors returned by entry log implementations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// SQLite error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The log was closed.
    #[error("entry log is closed")]
    Closed,
    /// A compaction swap did not find every entry it was asked to replace.
    #[error("conflicting swap: {0}")]
    Conflict(String),
}

/// Errors reported by summarizer implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SummarizerError {
    /// Provider asked us to back off.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Any other provider or transport failure.
    #[error("provider error: {0}")]
    Provider(String),
}
