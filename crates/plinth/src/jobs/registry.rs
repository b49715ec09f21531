use crate::jobs::{error::QueueError, handler::JobHandler};
use std::{collections::HashMap, sync::Arc};

type Constructor = dyn Fn() -> Box<dyn JobHandler> + Send + Sync;

/// Maps a job type to a constructor producing a fresh handler.
///
/// Built once at startup and shared behind an `Arc`; lookups never mutate.
#[derive(Clone, Default)]
pub struct JobRegistry {
    constructors: HashMap<String, Arc<Constructor>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under its own `job_type()`. Each resolve hands out
    /// a clone of it. A later registration for the same type replaces this one.
    pub fn register<H>(&mut self, handler: H) -> &mut Self
    where
        H: JobHandler + Clone,
    {
        let job_type = handler.job_type();
        self.register_with(job_type, move || handler.clone())
    }

    pub fn register_with<H, F>(&mut self, job_type: &str, constructor: F) -> &mut Self
    where
        H: JobHandler,
        F: Fn() -> H + Send + Sync + 'static,
    {
        let replaced = self
            .constructors
            .insert(
                job_type.to_string(),
                Arc::new(move || Box::new(constructor()) as Box<dyn JobHandler>),
            )
            .is_some();
        if replaced {
            tracing::debug!(job_type, "job type re-registered, last registration wins");
        }
        self
    }

    pub fn resolve(&self, job_type: &str) -> Result<Box<dyn JobHandler>, QueueError> {
        self.constructors
            .get(job_type)
            .map(|ctor| ctor())
            .ok_or_else(|| QueueError::UnregisteredJobType(job_type.to_string()))
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.constructors.contains_key(job_type)
    }

    /// Registered job types in alphabetical order.
    pub fn job_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{
        error::JobError,
        handler::{boxed, BoxFuture},
    };

    #[derive(Clone)]
    struct Limited(i32);

    impl JobHandler for Limited {
        fn job_type(&self) -> &'static str {
            "limited"
        }

        fn handle<'a>(&'a self, _payload: &'a [u8]) -> BoxFuture<'a, Result<(), JobError>> {
            boxed(async { Ok(()) })
        }

        fn max_attempts(&self) -> i32 {
            self.0
        }
    }

    #[test]
    fn resolve_unknown_type_fails() {
        let registry = JobRegistry::new();
        match registry.resolve("missing") {
            Err(QueueError::UnregisteredJobType(t)) => assert_eq!(t, "missing"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected resolve to fail"),
        }
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = JobRegistry::new();
        registry.register(Limited(3)).register(Limited(7));

        assert_eq!(registry.len(), 1);
        let handler = registry.resolve("limited").unwrap();
        assert_eq!(handler.max_attempts(), 7);
    }

    #[test]
    fn register_with_uses_explicit_key() {
        let mut registry = JobRegistry::new();
        registry.register_with("alias", || Limited(1));
        registry.register(Limited(2));

        assert!(registry.contains("alias"));
        assert_eq!(registry.job_types(), vec!["alias", "limited"]);
        assert_eq!(registry.resolve("alias").unwrap().max_attempts(), 1);
    }
}
