//! Persistence boundary for job rows.
//!
//! Every state transition is a conditional write: it names the state the
//! row is expected to be in and reports whether the row was actually moved.
//! A `false` return means another worker got there first.

use crate::jobs::{
    error::StoreError,
    model::{Job, JobState, NewJob, StateCounts},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub mod memory;
pub mod postgres;

pub use memory::MemoryJobStore;
pub use postgres::JobsRepo;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Inserts a new `pending` row with `attempts = 0`.
    async fn insert(&self, job: NewJob) -> Result<Job, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Job>, StoreError>;

    /// Oldest `pending` row with `available_at <= now`, read without locking.
    async fn next_due(&self, now: DateTime<Utc>) -> Result<Option<Job>, StoreError>;

    /// `pending -> started`, bumping `attempts` and stamping `started_at`.
    /// Returns the claimed row, or `None` if the row was no longer pending.
    async fn claim(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<Job>, StoreError>;

    /// `started -> finished`.
    async fn mark_finished(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, StoreError>;

    /// `from -> failed` with the error text and `finished_at`. `from` is
    /// `pending` for rows whose type cannot be resolved, `started` otherwise.
    async fn mark_failed(
        &self,
        id: Uuid,
        from: JobState,
        error_message: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// `started -> pending` with the error text and a deferred `available_at`.
    async fn release_for_retry(
        &self,
        id: Uuid,
        error_message: &str,
        available_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Returns `started` rows claimed before `started_before` to `pending`,
    /// due at `now`. Used to recover rows left behind by a dead worker.
    async fn recover_stale(
        &self,
        started_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn counts(&self) -> Result<StateCounts, StoreError>;

    /// Newest rows first, optionally filtered by state.
    async fn list(&self, state: Option<JobState>, limit: i64) -> Result<Vec<Job>, StoreError>;
}
