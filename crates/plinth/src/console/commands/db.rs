use crate::{
    console::{AppContext, Command},
    db,
};
use async_trait::async_trait;
use std::sync::Arc;

const FORCE: &str = "--force";

/// Destructive commands only run with `--force`; without it they explain
/// what would happen and leave the database alone.
fn confirmed(args: &[String], action: &str) -> bool {
    if args.iter().any(|a| a == FORCE) {
        return true;
    }
    println!("! this will {action}");
    println!("  re-run with {FORCE} to confirm");
    false
}

pub struct DbUpCommand {
    ctx: Arc<AppContext>,
}

impl DbUpCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for DbUpCommand {
    fn signature(&self) -> &str {
        "db:up"
    }

    fn description(&self) -> &str {
        "Run pending database migrations"
    }

    async fn execute(&self, _args: &[String]) -> anyhow::Result<()> {
        let pool = self.ctx.pool().await?;
        let before = db::migration_status(pool).await?;
        db::run_migrations(pool).await?;

        let pending: Vec<_> = before.iter().filter(|m| !m.applied).collect();
        if pending.is_empty() {
            println!("nothing to migrate");
        }
        for m in pending {
            println!("+ applied {} {}", m.version, m.description);
        }
        Ok(())
    }
}

pub struct DbStatusCommand {
    ctx: Arc<AppContext>,
}

impl DbStatusCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for DbStatusCommand {
    fn signature(&self) -> &str {
        "db:status"
    }

    fn description(&self) -> &str {
        "Show database migration status"
    }

    async fn execute(&self, _args: &[String]) -> anyhow::Result<()> {
        let pool = self.ctx.pool().await?;
        let status = db::migration_status(pool).await?;

        println!("Migration status:");
        for m in &status {
            let mark = if m.applied { "applied" } else { "pending" };
            println!("  [{mark:<7}] {} {}", m.version, m.description);
        }
        let applied = status.iter().filter(|m| m.applied).count();
        println!("applied={applied} pending={}", status.len() - applied);
        Ok(())
    }
}

pub struct DbDownCommand {
    ctx: Arc<AppContext>,
}

impl DbDownCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for DbDownCommand {
    fn signature(&self) -> &str {
        "db:down"
    }

    fn description(&self) -> &str {
        "Rollback the last database migration [--force]"
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<()> {
        if !confirmed(args, "revert the newest applied migration") {
            return Ok(());
        }

        let pool = self.ctx.pool().await?;
        match db::rollback_last(pool).await? {
            Some(m) => println!("- reverted {} {}", m.version, m.description),
            None => println!("nothing to roll back"),
        }
        Ok(())
    }
}

pub struct DbFreshCommand {
    ctx: Arc<AppContext>,
}

impl DbFreshCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for DbFreshCommand {
    fn signature(&self) -> &str {
        "db:fresh"
    }

    fn description(&self) -> &str {
        "Drop all tables and re-run all migrations [--force]"
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<()> {
        if !confirmed(args, "drop every table and all data in it") {
            return Ok(());
        }

        let pool = self.ctx.pool().await?;
        let reverted = db::rollback_all(pool).await?;
        println!("- reverted {reverted} migration(s)");

        db::run_migrations(pool).await?;
        for m in db::migration_status(pool).await? {
            println!("+ applied {} {}", m.version, m.description);
        }
        Ok(())
    }
}
