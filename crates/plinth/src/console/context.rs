use crate::{
    config::Config,
    db,
    jobs::{JobRegistry, JobStore, JobsRepo, Queue, QueueConfig},
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Shared state for console commands. The database pool is only opened by
/// the first command that needs it, so `list` works without a database.
pub struct AppContext {
    config: Config,
    registry: Arc<JobRegistry>,
    pool: OnceCell<PgPool>,
    store: OnceCell<Arc<dyn JobStore>>,
}

impl AppContext {
    pub fn new(config: Config, registry: Arc<JobRegistry>) -> Self {
        Self {
            config,
            registry,
            pool: OnceCell::new(),
            store: OnceCell::new(),
        }
    }

    /// Context whose queue commands use `store` instead of Postgres.
    pub fn with_store(config: Config, registry: Arc<JobRegistry>, store: Arc<dyn JobStore>) -> Self {
        Self {
            config,
            registry,
            pool: OnceCell::new(),
            store: OnceCell::from(store),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub async fn pool(&self) -> anyhow::Result<&PgPool> {
        self.pool
            .get_or_try_init(|| db::make_pool(&self.config))
            .await
    }

    pub async fn store(&self) -> anyhow::Result<Arc<dyn JobStore>> {
        let store = self
            .store
            .get_or_try_init(|| async {
                let pool = self.pool().await?;
                Ok::<_, anyhow::Error>(Arc::new(JobsRepo::new(pool.clone())) as Arc<dyn JobStore>)
            })
            .await?;
        Ok(store.clone())
    }

    pub async fn queue(&self) -> anyhow::Result<Queue> {
        let store = self.store().await?;
        Ok(Queue::new(
            store,
            self.registry.clone(),
            QueueConfig {
                poll_interval: self.config.poll_interval,
            },
        ))
    }
}
