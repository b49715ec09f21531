use crate::{
    console::{AppContext, Command},
    jobs::{dispatch_raw, JobState, PollOutcome},
};
use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_STALE_SECS: i64 = 300;

pub struct QueueWorkCommand {
    ctx: Arc<AppContext>,
}

impl QueueWorkCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for QueueWorkCommand {
    fn signature(&self) -> &str {
        "queue:work"
    }

    fn description(&self) -> &str {
        "Process queued jobs ([workers] [--once])"
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<()> {
        let mut workers = self.ctx.config().queue_workers;
        let mut once = false;
        for arg in args {
            match arg.as_str() {
                "--once" => once = true,
                n => {
                    workers = n
                        .parse()
                        .with_context(|| format!("invalid worker count '{n}'"))?
                }
            }
        }

        let queue = self.ctx.queue().await?;

        if once {
            let outcomes = queue.run_until_idle("console").await?;
            let finished = outcomes
                .iter()
                .filter(|o| matches!(o, PollOutcome::Finished(_)))
                .count();
            let failed = outcomes
                .iter()
                .filter(|o| matches!(o, PollOutcome::Failed(_) | PollOutcome::Unresolved(_)))
                .count();
            let retrying = outcomes
                .iter()
                .filter(|o| matches!(o, PollOutcome::Retrying { .. }))
                .count();
            println!("processed={} finished={finished} failed={failed} retrying={retrying}", outcomes.len());
            return Ok(());
        }

        let pool = queue.start(workers);
        println!("queue running with {workers} worker(s), press Ctrl-C to stop");
        tokio::signal::ctrl_c().await?;
        pool.shutdown().await;
        Ok(())
    }
}

pub struct QueueDispatchCommand {
    ctx: Arc<AppContext>,
}

impl QueueDispatchCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for QueueDispatchCommand {
    fn signature(&self) -> &str {
        "queue:dispatch"
    }

    fn description(&self) -> &str {
        "Dispatch a job: <job_type> [json payload]"
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<()> {
        let Some(job_type) = args.first() else {
            bail!("usage: queue:dispatch <job_type> [json payload]");
        };
        if !self.ctx.registry().contains(job_type) {
            bail!(
                "job type '{job_type}' not registered (known: {})",
                self.ctx.registry().job_types().join(", ")
            );
        }

        let raw = args.get(1).map(String::as_str).unwrap_or("null");
        let payload: serde_json::Value =
            serde_json::from_str(raw).context("payload is not valid JSON")?;

        let store = self.ctx.store().await?;
        let job = dispatch_raw(store.as_ref(), job_type, serde_json::to_vec(&payload)?).await?;
        println!("+ dispatched job {job_type} id={}", job.id);
        Ok(())
    }
}

pub struct QueueStatusCommand {
    ctx: Arc<AppContext>,
}

impl QueueStatusCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for QueueStatusCommand {
    fn signature(&self) -> &str {
        "queue:status"
    }

    fn description(&self) -> &str {
        "Show job counts per state"
    }

    async fn execute(&self, _args: &[String]) -> anyhow::Result<()> {
        let counts = self.ctx.store().await?.counts().await?;
        let per_state: Vec<String> = JobState::ALL
            .iter()
            .map(|s| format!("{s}={}", counts.get(*s)))
            .collect();
        println!("jobs: {} total={}", per_state.join(" "), counts.total());
        Ok(())
    }
}

pub struct QueueShowCommand {
    ctx: Arc<AppContext>,
}

impl QueueShowCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for QueueShowCommand {
    fn signature(&self) -> &str {
        "queue:show"
    }

    fn description(&self) -> &str {
        "Show one job: <id>"
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<()> {
        let Some(raw) = args.first() else {
            bail!("usage: queue:show <id>");
        };
        let id: Uuid = raw.parse().with_context(|| format!("invalid job id '{raw}'"))?;

        let Some(job) = self.ctx.store().await?.get(id).await? else {
            bail!("job {id} not found");
        };

        println!(
            "JOB: id={} type={} state={} attempts={} available_at={} created_at={}",
            job.id, job.job_type, job.state, job.attempts, job.available_at, job.created_at
        );
        println!(
            "     started_at={:?} finished_at={:?} error={:?}",
            job.started_at, job.finished_at, job.error_message
        );
        println!("     payload={}", String::from_utf8_lossy(&job.payload));
        Ok(())
    }
}

pub struct QueueRecoverCommand {
    ctx: Arc<AppContext>,
}

impl QueueRecoverCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for QueueRecoverCommand {
    fn signature(&self) -> &str {
        "queue:recover"
    }

    fn description(&self) -> &str {
        "Return jobs stuck in started to pending: [seconds]"
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<()> {
        let secs = match args.first() {
            Some(raw) => raw
                .parse::<i64>()
                .ok()
                .filter(|s| *s >= 0)
                .with_context(|| format!("invalid age in seconds '{raw}'"))?,
            None => DEFAULT_STALE_SECS,
        };

        let now = Utc::now();
        let cutoff = chrono::Duration::try_seconds(secs)
            .and_then(|age| now.checked_sub_signed(age))
            .with_context(|| format!("age of {secs} seconds is out of range"))?;
        let recovered = self.ctx.store().await?.recover_stale(cutoff, now).await?;

        tracing::info!(recovered, older_than_secs = secs, "stale jobs recovered");
        println!("recovered {recovered} job(s) started before {cutoff}");
        Ok(())
    }
}
