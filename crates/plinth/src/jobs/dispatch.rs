use crate::jobs::{
    error::QueueError,
    handler::JobHandler,
    model::{Job, NewJob},
    store::JobStore,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Enqueues `handler`'s job type with `params` encoded as JSON, due now.
///
/// Several parameters can be passed as a tuple; it encodes as a JSON array.
pub async fn dispatch<H, P>(store: &dyn JobStore, handler: &H, params: &P) -> Result<Job, QueueError>
where
    H: JobHandler + ?Sized,
    P: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(params)?;
    dispatch_raw(store, handler.job_type(), payload).await
}

/// Same as [`dispatch`], but the row only becomes due at `available_at`.
pub async fn dispatch_at<H, P>(
    store: &dyn JobStore,
    handler: &H,
    params: &P,
    available_at: DateTime<Utc>,
) -> Result<Job, QueueError>
where
    H: JobHandler + ?Sized,
    P: Serialize + ?Sized,
{
    let payload = serde_json::to_vec(params)?;
    let mut job = NewJob::now(handler.job_type(), payload);
    job.available_at = available_at;
    insert(store, job).await
}

/// Enqueues an already-encoded payload under `job_type`.
pub async fn dispatch_raw(
    store: &dyn JobStore,
    job_type: &str,
    payload: Vec<u8>,
) -> Result<Job, QueueError> {
    insert(store, NewJob::now(job_type, payload)).await
}

async fn insert(store: &dyn JobStore, job: NewJob) -> Result<Job, QueueError> {
    let row = store.insert(job).await?;
    info!(
        job_id = %row.id,
        job_type = %row.job_type,
        available_at = %row.available_at,
        "job dispatched"
    );
    Ok(row)
}

/// Cloneable handle for producers that only need to enqueue.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn JobStore>,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn dispatch<H, P>(&self, handler: &H, params: &P) -> Result<Job, QueueError>
    where
        H: JobHandler + ?Sized,
        P: Serialize + ?Sized,
    {
        dispatch(self.store.as_ref(), handler, params).await
    }

    pub async fn dispatch_at<H, P>(
        &self,
        handler: &H,
        params: &P,
        available_at: DateTime<Utc>,
    ) -> Result<Job, QueueError>
    where
        H: JobHandler + ?Sized,
        P: Serialize + ?Sized,
    {
        dispatch_at(self.store.as_ref(), handler, params, available_at).await
    }

    pub async fn dispatch_raw(&self, job_type: &str, payload: Vec<u8>) -> Result<Job, QueueError> {
        dispatch_raw(self.store.as_ref(), job_type, payload).await
    }
}
