#![allow(dead_code)]

use plinth::jobs::{boxed, BoxFuture, JobError, JobHandler};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Connects to `TEST_DATABASE_URL`, migrates and empties the jobs table.
/// Returns `None` (and the test should return early) when the variable is unset.
pub async fn setup_db() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping postgres test");
        return None;
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .expect("failed to connect to TEST_DATABASE_URL");

    plinth::db::run_migrations(&pool)
        .await
        .expect("migrations failed");

    sqlx::query("TRUNCATE TABLE jobs")
        .execute(&pool)
        .await
        .expect("truncate failed");

    Some(pool)
}

/// Test handler whose behaviour is fixed at construction: it fails its
/// first `fail_first` runs (or every run when `None`), optionally panicking.
#[derive(Clone)]
pub struct Scripted {
    pub job_type: &'static str,
    pub fail_first: Option<usize>,
    pub panics: bool,
    pub max_attempts: i32,
    pub retry_after: Duration,
    pub calls: Arc<AtomicUsize>,
    pub seen: Arc<std::sync::Mutex<Vec<Vec<u8>>>>,
}

impl Scripted {
    pub fn ok(job_type: &'static str) -> Self {
        Self {
            job_type,
            fail_first: Some(0),
            panics: false,
            max_attempts: 3,
            retry_after: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn flaky(job_type: &'static str, fail_first: usize) -> Self {
        Self {
            fail_first: Some(fail_first),
            ..Self::ok(job_type)
        }
    }

    pub fn always_fail(job_type: &'static str) -> Self {
        Self {
            fail_first: None,
            ..Self::ok(job_type)
        }
    }

    pub fn panicking(job_type: &'static str) -> Self {
        Self {
            panics: true,
            ..Self::ok(job_type)
        }
    }

    pub fn max_attempts(mut self, n: i32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn retry_after(mut self, d: Duration) -> Self {
        self.retry_after = d;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.seen.lock().unwrap().clone()
    }
}

impl JobHandler for Scripted {
    fn job_type(&self) -> &'static str {
        self.job_type
    }

    fn max_attempts(&self) -> i32 {
        self.max_attempts
    }

    fn retry_after(&self) -> Duration {
        self.retry_after
    }

    fn handle<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<(), JobError>> {
        boxed(async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.seen.lock().unwrap().push(payload.to_vec());

            if self.panics {
                panic!("handler blew up on run {n}");
            }
            match self.fail_first {
                Some(k) if n > k => Ok(()),
                _ => Err(JobError::new(format!("failure on run {n}"))),
            }
        })
    }
}
