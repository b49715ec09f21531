use crate::jobs::{
    error::{JobError, StoreError},
    handler::JobHandler,
    model::JobState,
    registry::JobRegistry,
    store::JobStore,
};
use chrono::{DateTime, Utc};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{sync::watch, task::JoinSet};
use tracing::{debug, error, field, info, instrument, warn, Instrument, Span};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Sleep after a poll that found nothing due, or after a store error.
    pub poll_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// What a single poll did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was due.
    Idle,
    /// Another worker moved the row first.
    Contended(Uuid),
    /// The job type had no handler; the row was failed without running.
    Unresolved(Uuid),
    Finished(Uuid),
    /// The handler failed and the row went back to `pending`.
    Retrying {
        id: Uuid,
        available_at: DateTime<Utc>,
    },
    /// The handler failed on its last allowed attempt.
    Failed(Uuid),
}

/// Drains due jobs from a [`JobStore`] using handlers from a [`JobRegistry`].
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn JobStore>,
    registry: Arc<JobRegistry>,
    config: QueueConfig,
}

impl Queue {
    pub fn new(store: Arc<dyn JobStore>, registry: Arc<JobRegistry>, config: QueueConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Spawns `worker_count` polling loops on the current tokio runtime.
    pub fn start(&self, worker_count: usize) -> WorkerPool {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut workers = JoinSet::new();

        if worker_count == 0 {
            warn!("queue started with zero workers, nothing will be processed");
        }

        for n in 1..=worker_count {
            let queue = self.clone();
            let shutdown = shutdown_rx.clone();
            workers.spawn(queue.work(format!("worker-{n}"), shutdown));
        }

        info!(
            workers = worker_count,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            job_types = ?self.registry.job_types(),
            "queue started"
        );

        WorkerPool {
            shutdown: shutdown_tx,
            workers,
        }
    }

    async fn work(self, worker_id: String, mut shutdown: watch::Receiver<bool>) {
        debug!(worker_id = %worker_id, "worker started");

        loop {
            if stop_requested(&shutdown) {
                break;
            }

            let idle = match self.run_once(&worker_id).await {
                Ok(PollOutcome::Idle) => true,
                Ok(_) => false,
                Err(err) => {
                    // An unreachable store must not look like an empty queue.
                    error!(worker_id = %worker_id, error = %err, "job store error while polling");
                    true
                }
            };

            if idle {
                tokio::select! {
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        debug!(worker_id = %worker_id, "worker stopped");
    }

    /// Polls until nothing is due, returning every non-idle outcome.
    pub async fn run_until_idle(&self, worker_id: &str) -> Result<Vec<PollOutcome>, StoreError> {
        let mut outcomes = Vec::new();
        loop {
            match self.run_once(worker_id).await? {
                PollOutcome::Idle => return Ok(outcomes),
                outcome => outcomes.push(outcome),
            }
        }
    }

    /// One iteration of the worker loop: pick the oldest due row, claim it
    /// and run it to an outcome.
    #[instrument(
        skip_all,
        fields(worker_id = %worker_id, job_id = field::Empty, job_type = field::Empty)
    )]
    pub async fn run_once(&self, worker_id: &str) -> Result<PollOutcome, StoreError> {
        let Some(candidate) = self.store.next_due(Utc::now()).await? else {
            return Ok(PollOutcome::Idle);
        };

        let span = Span::current();
        span.record("job_id", field::display(candidate.id));
        span.record("job_type", candidate.job_type.as_str());

        let handler = match self.registry.resolve(&candidate.job_type) {
            Ok(handler) => handler,
            Err(err) => {
                let message = err.to_string();
                let failed = self
                    .store
                    .mark_failed(candidate.id, JobState::Pending, &message, Utc::now())
                    .await?;
                if !failed {
                    return Ok(PollOutcome::Contended(candidate.id));
                }
                warn!(error = %message, "job type not registered, job failed");
                return Ok(PollOutcome::Unresolved(candidate.id));
            }
        };

        let max_attempts = handler.max_attempts();
        let retry_after = handler.retry_after();

        // Rows returned by recover_stale keep the attempts they already used.
        if candidate.attempts >= max_attempts {
            let message = format!(
                "attempts exhausted before recovery ({} of {max_attempts})",
                candidate.attempts
            );
            let failed = self
                .store
                .mark_failed(candidate.id, JobState::Pending, &message, Utc::now())
                .await?;
            if !failed {
                return Ok(PollOutcome::Contended(candidate.id));
            }
            warn!(
                attempts = candidate.attempts,
                max_attempts, "job failed without running, attempts exhausted"
            );
            return Ok(PollOutcome::Failed(candidate.id));
        }

        let Some(job) = self.store.claim(candidate.id, Utc::now()).await? else {
            debug!("job claimed by another worker");
            return Ok(PollOutcome::Contended(candidate.id));
        };

        debug!(attempt = job.attempts, max_attempts, "job started");

        let started = Instant::now();
        let result = execute(handler, job.payload).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                if !self.store.mark_finished(job.id, Utc::now()).await? {
                    warn!("job left started state while running");
                }
                info!(attempts = job.attempts, latency_ms, "job finished");
                Ok(PollOutcome::Finished(job.id))
            }
            Err(err) if job.attempts >= max_attempts => {
                if !self
                    .store
                    .mark_failed(job.id, JobState::Started, &err.message, Utc::now())
                    .await?
                {
                    warn!("job left started state while running");
                }
                warn!(
                    attempts = job.attempts,
                    max_attempts,
                    latency_ms,
                    error = %err,
                    "job failed, attempts exhausted"
                );
                Ok(PollOutcome::Failed(job.id))
            }
            Err(err) => {
                let available_at = retry_at(Utc::now(), retry_after);
                if !self
                    .store
                    .release_for_retry(job.id, &err.message, available_at)
                    .await?
                {
                    warn!("job left started state while running");
                }
                info!(
                    attempts = job.attempts,
                    max_attempts,
                    latency_ms,
                    %available_at,
                    error = %err,
                    "job failed, retry scheduled"
                );
                Ok(PollOutcome::Retrying {
                    id: job.id,
                    available_at,
                })
            }
        }
    }
}

/// Runs the handler on its own task so a panic becomes an ordinary failure.
async fn execute(handler: Box<dyn JobHandler>, payload: Vec<u8>) -> Result<(), JobError> {
    let task = tokio::spawn(async move { handler.handle(&payload).await }.in_current_span());

    match task.await {
        Ok(result) => result,
        Err(err) if err.is_panic() => {
            let panic = err.into_panic();
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            Err(JobError::new(format!("handler panicked: {detail}")))
        }
        Err(err) => Err(JobError::new(format!("handler task aborted: {err}"))),
    }
}

fn retry_at(now: DateTime<Utc>, retry_after: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(retry_after)
        .ok()
        .and_then(|delay| now.checked_add_signed(delay))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

/// Running worker loops. Dropping the pool aborts them; [`shutdown`]
/// lets each finish the job it is running first.
///
/// [`shutdown`]: WorkerPool::shutdown
pub struct WorkerPool {
    shutdown: watch::Sender<bool>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub async fn shutdown(mut self) {
        let _ = self.shutdown.send(true);
        while let Some(joined) = self.workers.join_next().await {
            if let Err(err) = joined {
                error!(error = %err, "worker task ended abnormally");
            }
        }
        info!("queue stopped");
    }
}
