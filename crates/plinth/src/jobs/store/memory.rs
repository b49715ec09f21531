use crate::jobs::{
    error::StoreError,
    model::{Job, JobState, NewJob, StateCounts},
    store::JobStore,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process job table. Rows are kept in insertion order, which doubles as
/// the tie-break when two rows share a `created_at`.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<Vec<Job>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with [`StoreError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.read().await.clone()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store switched off".into()));
        }
        Ok(())
    }

    async fn transition<F>(&self, id: Uuid, from: JobState, apply: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Job) + Send,
    {
        self.check_available()?;
        let mut jobs = self.jobs.write().await;
        match jobs.iter_mut().find(|j| j.id == id && j.state == from) {
            Some(job) => {
                apply(job);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: NewJob) -> Result<Job, StoreError> {
        self.check_available()?;
        let row = Job {
            id: Uuid::new_v4(),
            job_type: job.job_type,
            payload: job.payload,
            state: JobState::Pending,
            error_message: None,
            attempts: 0,
            available_at: job.available_at,
            created_at: job.created_at,
            started_at: None,
            finished_at: None,
        };
        self.jobs.write().await.push(row.clone());
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError> {
        self.check_available()?;
        Ok(self.jobs.read().await.iter().find(|j| j.id == id).cloned())
    }

    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>, StoreError> {
        self.check_available()?;
        let jobs = self.jobs.read().await;
        // min_by_key keeps the first of equal keys, so insertion order breaks ties.
        Ok(jobs
            .iter()
            .filter(|j| j.state == JobState::Pending && j.available_at <= now)
            .min_by_key(|j| j.created_at)
            .cloned())
    }

    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Job>, StoreError> {
        self.check_available()?;
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs
            .iter_mut()
            .find(|j| j.id == id && j.state == JobState::Pending)
        else {
            return Ok(None);
        };
        job.state = JobState::Started;
        job.started_at = Some(now);
        job.attempts += 1;
        Ok(Some(job.clone()))
    }

    async fn mark_finished(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.transition(id, JobState::Started, |job| {
            job.state = JobState::Finished;
            job.finished_at = Some(now);
        })
        .await
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        from: JobState,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let message = error_message.to_string();
        self.transition(id, from, |job| {
            job.state = JobState::Failed;
            job.error_message = Some(message);
            job.finished_at = Some(now);
        })
        .await
    }

    async fn release_for_retry(
        &self,
        id: Uuid,
        error_message: &str,
        available_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let message = error_message.to_string();
        self.transition(id, JobState::Started, |job| {
            job.state = JobState::Pending;
            job.error_message = Some(message);
            job.available_at = available_at;
        })
        .await
    }

    async fn recover_stale(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        self.check_available()?;
        let mut jobs = self.jobs.write().await;
        let mut recovered = 0;
        for job in jobs.iter_mut().filter(|j| {
            j.state == JobState::Started && j.started_at.is_some_and(|t| t < started_before)
        }) {
            job.state = JobState::Pending;
            job.available_at = now;
            recovered += 1;
        }
        Ok(recovered)
    }

    async fn counts(&self) -> Result<StateCounts, StoreError> {
        self.check_available()?;
        let mut counts = StateCounts::default();
        for job in self.jobs.read().await.iter() {
            counts.add(job.state, 1);
        }
        Ok(counts)
    }

    async fn list(&self, state: Option<JobState>, limit: i64) -> Result<Vec<Job>, StoreError> {
        self.check_available()?;
        let limit = limit.clamp(1, 500) as usize;
        let jobs = self.jobs.read().await;
        let mut rows: Vec<Job> = jobs
            .iter()
            .rev()
            .filter(|j| state.map_or(true, |s| j.state == s))
            .cloned()
            .collect();
        // stable sort keeps newer-inserted rows first among equal timestamps
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit);
        Ok(rows)
    }
}
