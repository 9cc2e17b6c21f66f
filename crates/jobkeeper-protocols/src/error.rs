//! Error types for the jobkeeper engine.

use thiserror::Error;

/// Errors surfaced synchronously by controller operations.
///
/// These are definition errors in the engine's taxonomy: they abort the
/// operation before any live schedule state is mutated. Execution failures
/// never appear here; they are only visible through the persisted
/// execution history.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Job definition not found.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// No runnable registered under the definition's registry key.
    #[error("Runnable not found for key: {0}")]
    RunnableNotFound(String),

    /// Cron expression failed to parse.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// Execution record not found.
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    /// Manual trigger rejected because the job is in flight and its
    /// concurrency policy forbids overlap.
    #[error("Job already running: {0}")]
    AlreadyRunning(String),

    /// Store-layer failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Store-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Record not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Failed to open or reach the database.
    #[error("Connection error: {0}")]
    Connection(String),

    /// A query or write failed.
    #[error("Query error: {0}")]
    Query(String),
}

/// Errors returned by job bodies.
#[derive(Debug, Error)]
pub enum JobError {
    /// The body failed with a human-readable reason.
    #[error("{0}")]
    Failed(String),

    /// I/O failure inside the body.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl JobError {
    /// Shorthand for a failure with a message.
    pub fn failed(reason: impl Into<String>) -> Self {
        JobError::Failed(reason.into())
    }
}
