use crate::jobs::{Job, JobState, StateCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// JSON shape of a job row. The payload is inlined when it is valid JSON
/// and sent as a lossy UTF-8 string otherwise.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub job_type: String,
    pub state: JobState,
    pub payload: Value,
    pub error_message: Option<String>,
    pub attempts: i32,

    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        let payload = serde_json::from_slice(&job.payload)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&job.payload).into_owned()));

        Self {
            id: job.id,
            job_type: job.job_type,
            state: job.state,
            payload,
            error_message: job.error_message,
            attempts: job.attempts,
            available_at: job.available_at,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct StatsResponse {
    pub pending: i64,
    pub started: i64,
    pub finished: i64,
    pub failed: i64,
    pub total: i64,
}

impl From<StateCounts> for StatsResponse {
    fn from(c: StateCounts) -> Self {
        Self {
            pending: c.pending,
            started: c.started,
            finished: c.finished,
            failed: c.failed,
            total: c.total(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub state: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub job_type: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}
