use crate::config::Config;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};
use std::collections::HashSet;
use tracing::info;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

pub async fn make_pool(cfg: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_max_connections)
        .acquire_timeout(cfg.db_acquire_timeout)
        .connect(&cfg.database_url)
        .await?;

    info!(
        max_connections = cfg.db_max_connections,
        "database pool connected"
    );
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}

/// Reverts the newest applied migration. Returns it, or `None` when
/// nothing was applied.
pub async fn rollback_last(pool: &PgPool) -> anyhow::Result<Option<MigrationStatus>> {
    let applied: Vec<MigrationStatus> = migration_status(pool)
        .await?
        .into_iter()
        .filter(|m| m.applied)
        .collect();

    let Some((last, rest)) = applied.split_last() else {
        return Ok(None);
    };
    let target = rest.last().map_or(0, |m| m.version);

    MIGRATOR.undo(pool, target).await?;
    info!(version = last.version, "migration rolled back");
    Ok(Some(last.clone()))
}

/// Reverts every applied migration. Returns how many were reverted.
pub async fn rollback_all(pool: &PgPool) -> anyhow::Result<usize> {
    let applied = migration_status(pool)
        .await?
        .iter()
        .filter(|m| m.applied)
        .count();

    MIGRATOR.undo(pool, 0).await?;
    info!(reverted = applied, "all migrations rolled back");
    Ok(applied)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub version: i64,
    pub description: String,
    pub applied: bool,
}

/// Every migration known to this build, marked applied or pending.
pub async fn migration_status(pool: &PgPool) -> anyhow::Result<Vec<MigrationStatus>> {
    let table_exists: bool =
        sqlx::query_scalar("SELECT to_regclass('_sqlx_migrations') IS NOT NULL")
            .fetch_one(pool)
            .await?;

    let applied: HashSet<i64> = if table_exists {
        sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(pool)
            .await?
            .into_iter()
            .collect()
    } else {
        HashSet::new()
    };

    Ok(MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .map(|m| MigrationStatus {
            version: m.version,
            description: m.description.to_string(),
            applied: applied.contains(&m.version),
        })
        .collect())
}
