use plinth::jobs::{boxed, decode_payload, BoxFuture, JobError, JobHandler, JobRegistry};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::info;

/// Logs its payload. Useful for checking that workers are alive.
#[derive(Clone)]
pub struct TestJob;

impl JobHandler for TestJob {
    fn job_type(&self) -> &'static str {
        "test"
    }

    fn handle<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<(), JobError>> {
        boxed(async move {
            info!(payload = %String::from_utf8_lossy(payload), "test job is running");
            Ok(())
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailPayload {
    pub to: String,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Demo mail job. Delivery is simulated; replace the body with a real client.
#[derive(Clone)]
pub struct SendEmailJob {
    pub send_timeout: Duration,
}

impl Default for SendEmailJob {
    fn default() -> Self {
        Self {
            send_timeout: Duration::from_secs(10),
        }
    }
}

impl JobHandler for SendEmailJob {
    fn job_type(&self) -> &'static str {
        "email"
    }

    fn max_attempts(&self) -> i32 {
        5
    }

    fn retry_after(&self) -> Duration {
        Duration::from_secs(30)
    }

    fn handle<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<(), JobError>> {
        boxed(async move {
            let email: EmailPayload = decode_payload(payload)?;
            if !email.to.contains('@') {
                return Err(JobError::new(format!("invalid recipient '{}'", email.to)));
            }

            let send = tokio::time::sleep(Duration::from_millis(50));
            timeout(self.send_timeout, send).await.map_err(|_| {
                JobError::new(format!(
                    "send timed out after {}ms",
                    self.send_timeout.as_millis()
                ))
            })?;

            info!(
                to = %email.to,
                subject = email.subject.as_deref().unwrap_or(""),
                "email sent"
            );
            Ok(())
        })
    }
}

pub fn build_registry() -> Arc<JobRegistry> {
    let mut registry = JobRegistry::new();

    // Demo handlers. Replace these with your real jobs.
    registry.register(TestJob).register(SendEmailJob::default());

    Arc::new(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_demo_jobs() {
        let registry = build_registry();
        assert_eq!(registry.job_types(), vec!["email", "test"]);
    }

    #[tokio::test]
    async fn email_rejects_bad_payloads() {
        let job = SendEmailJob::default();

        let err = job.handle(b"{}").await.unwrap_err();
        assert!(err.message.starts_with("bad payload"));

        let err = job.handle(br#"{"to":"nobody"}"#).await.unwrap_err();
        assert_eq!(err.message, "invalid recipient 'nobody'");

        job.handle(br#"{"to":"a@b.com","subject":"hi"}"#).await.unwrap();
    }
}
