use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// One row of the `jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub payload: Vec<u8>,
    #[sqlx(try_from = "String")]
    pub state: JobState,
    pub error_message: Option<String>,
    pub attempts: i32,

    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub payload: Vec<u8>,
    pub available_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewJob {
    /// A job that is due immediately.
    pub fn now(job_type: impl Into<String>, payload: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            job_type: job_type.into(),
            payload,
            available_at: now,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Started,
    Finished,
    Failed,
}

impl JobState {
    pub const ALL: [JobState; 4] = [
        JobState::Pending,
        JobState::Started,
        JobState::Finished,
        JobState::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Started => "started",
            JobState::Finished => "finished",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown job state '{0}'")]
pub struct UnknownJobState(pub String);

impl FromStr for JobState {
    type Err = UnknownJobState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(JobState::Pending),
            "started" => Ok(JobState::Started),
            "finished" => Ok(JobState::Finished),
            "failed" => Ok(JobState::Failed),
            other => Err(UnknownJobState(other.to_string())),
        }
    }
}

impl TryFrom<String> for JobState {
    type Error = UnknownJobState;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Row counts per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub pending: i64,
    pub started: i64,
    pub finished: i64,
    pub failed: i64,
}

impl StateCounts {
    pub fn add(&mut self, state: JobState, n: i64) {
        match state {
            JobState::Pending => self.pending += n,
            JobState::Started => self.started += n,
            JobState::Finished => self.finished += n,
            JobState::Failed => self.failed += n,
        }
    }

    pub fn get(&self, state: JobState) -> i64 {
        match state {
            JobState::Pending => self.pending,
            JobState::Started => self.started,
            JobState::Finished => self.finished,
            JobState::Failed => self.failed,
        }
    }

    pub fn total(&self) -> i64 {
        self.pending + self.started + self.finished + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_parses_case_insensitively() {
        assert_eq!("Pending".parse::<JobState>().unwrap(), JobState::Pending);
        assert_eq!(" failed ".parse::<JobState>().unwrap(), JobState::Failed);
        assert!("dlq".parse::<JobState>().is_err());
    }

    #[test]
    fn only_finished_and_failed_are_terminal() {
        let terminal: Vec<_> = JobState::ALL.iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&JobState::Finished, &JobState::Failed]);
    }

    #[test]
    fn counts_accumulate_per_state() {
        let mut counts = StateCounts::default();
        counts.add(JobState::Pending, 2);
        counts.add(JobState::Failed, 1);
        counts.add(JobState::Pending, 1);

        assert_eq!(counts.get(JobState::Pending), 3);
        assert_eq!(counts.get(JobState::Failed), 1);
        assert_eq!(counts.total(), 4);
    }
}
