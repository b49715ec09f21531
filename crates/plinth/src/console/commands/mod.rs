mod db;
mod example;
mod queue;

use crate::console::{write_listing, AppContext, Command, Kernel};
use async_trait::async_trait;
use std::{io, sync::Arc};

pub use db::{DbDownCommand, DbFreshCommand, DbStatusCommand, DbUpCommand};
pub use example::ExampleCommand;
pub use queue::{
    QueueDispatchCommand, QueueRecoverCommand, QueueShowCommand, QueueStatusCommand,
    QueueWorkCommand,
};

pub(crate) fn register_builtin(kernel: &mut Kernel, ctx: Arc<AppContext>) {
    kernel
        .register(DbUpCommand::new(ctx.clone()))
        .register(DbDownCommand::new(ctx.clone()))
        .register(DbFreshCommand::new(ctx.clone()))
        .register(DbStatusCommand::new(ctx.clone()))
        .register(QueueWorkCommand::new(ctx.clone()))
        .register(QueueDispatchCommand::new(ctx.clone()))
        .register(QueueStatusCommand::new(ctx.clone()))
        .register(QueueShowCommand::new(ctx.clone()))
        .register(QueueRecoverCommand::new(ctx.clone()))
        .register(ExampleCommand::new(ctx));
}

/// Prints the listing captured when it was registered.
pub struct ListCommand {
    entries: Vec<(String, String)>,
}

impl ListCommand {
    pub fn new(entries: Vec<(String, String)>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl Command for ListCommand {
    fn signature(&self) -> &str {
        "list"
    }

    fn description(&self) -> &str {
        "List all available console commands"
    }

    async fn execute(&self, _args: &[String]) -> anyhow::Result<()> {
        println!("Available commands:");
        write_listing(&mut io::stdout(), &self.entries)?;
        Ok(())
    }
}
