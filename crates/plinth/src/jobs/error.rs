use thiserror::Error;

/// Failures surfaced by a [`JobStore`](crate::jobs::store::JobStore).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid job row: {0}")]
    InvalidRow(String),
}

/// Errors returned by the registry and the dispatch API.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("job type '{0}' not registered")]
    UnregisteredJobType(String),

    #[error("failed to encode job payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to save job: {0}")]
    Persistence(#[from] StoreError),
}

/// Failure reported by a job handler. The message lands in `error_message`.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct JobError {
    pub message: String,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        JobError::new(format!("bad payload: {e}"))
    }
}

impl From<anyhow::Error> for JobError {
    fn from(e: anyhow::Error) -> Self {
        JobError::new(format!("{e:#}"))
    }
}
