use crate::console::{AppContext, Command};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Template for application commands.
pub struct ExampleCommand {
    ctx: Arc<AppContext>,
}

impl ExampleCommand {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl Command for ExampleCommand {
    fn signature(&self) -> &str {
        "example:demo"
    }

    fn description(&self) -> &str {
        "Example command showing basic usage patterns"
    }

    async fn execute(&self, args: &[String]) -> anyhow::Result<()> {
        match args.first() {
            Some(first) => println!("first argument: {first}"),
            None => println!("no arguments provided"),
        }

        let job_types = self.ctx.registry().job_types();
        println!("registered job types: {}", job_types.join(", "));

        info!(
            command = self.signature(),
            args_count = args.len(),
            job_types = job_types.len(),
            "example command executed"
        );
        Ok(())
    }
}
