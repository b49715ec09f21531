//! Console command kernel.
//!
//! Commands are looked up by signature (the first positional argument). An
//! unknown or missing signature prints the command listing and succeeds.

use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    io::{self, Write},
    sync::Arc,
};

pub mod commands;
pub mod context;

pub use context::AppContext;

const SIGNATURE_WIDTH: usize = 20;

#[async_trait]
pub trait Command: Send + Sync {
    fn signature(&self) -> &str;
    fn description(&self) -> &str;
    async fn execute(&self, args: &[String]) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct Kernel {
    commands: BTreeMap<String, Arc<dyn Command>>,
}

impl Kernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kernel with the built-in commands. `extra` registers application
    /// commands; `list` is registered last so its listing includes them.
    pub fn with_defaults<F>(ctx: Arc<AppContext>, extra: F) -> Self
    where
        F: FnOnce(&mut Kernel),
    {
        let mut kernel = Self::new();
        commands::register_builtin(&mut kernel, ctx);
        extra(&mut kernel);
        kernel.register_list();
        kernel
    }

    /// Last registration for a signature wins.
    pub fn register<C>(&mut self, command: C) -> &mut Self
    where
        C: Command + 'static,
    {
        self.commands
            .insert(command.signature().to_string(), Arc::new(command));
        self
    }

    pub fn register_list(&mut self) -> &mut Self {
        let mut entries = self.listing();
        let list = commands::ListCommand::new(Vec::new());
        entries.push((list.signature().to_string(), list.description().to_string()));
        entries.sort();
        self.register(commands::ListCommand::new(entries))
    }

    pub fn get(&self, signature: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(signature).cloned()
    }

    /// `(signature, description)` pairs sorted by signature.
    pub fn listing(&self) -> Vec<(String, String)> {
        self.commands
            .iter()
            .map(|(sig, cmd)| (sig.clone(), cmd.description().to_string()))
            .collect()
    }

    /// `args[0]` is the signature; the rest go to the command.
    pub async fn run(&self, args: &[String]) -> anyhow::Result<()> {
        let Some(signature) = args.first() else {
            self.write_help(&mut io::stdout(), None)?;
            return Ok(());
        };

        match self.get(signature) {
            Some(command) => {
                tracing::debug!(command = %signature, args = ?&args[1..], "running console command");
                command.execute(&args[1..]).await
            }
            None => {
                self.write_help(&mut io::stdout(), Some(signature))?;
                Ok(())
            }
        }
    }

    pub fn write_help(&self, out: &mut impl Write, unknown: Option<&str>) -> io::Result<()> {
        if let Some(signature) = unknown {
            writeln!(out, "Command '{signature}' not found.")?;
        }
        writeln!(out, "Console Commands")?;
        writeln!(out, "Usage: app console <command> [arguments]")?;
        writeln!(out)?;
        writeln!(out, "Available commands:")?;
        write_listing(out, &self.listing())?;
        writeln!(out)?;
        writeln!(out, "Examples:")?;
        writeln!(out, "  app console list")?;
        writeln!(out, "  app console queue:dispatch email '{{\"to\":\"a@b.com\"}}'")?;
        Ok(())
    }
}

pub(crate) fn write_listing(out: &mut impl Write, entries: &[(String, String)]) -> io::Result<()> {
    for (signature, description) in entries {
        writeln!(out, "  {signature:<SIGNATURE_WIDTH$} {description}")?;
    }
    Ok(())
}
