use crate::jobs::error::JobError;
use serde::de::DeserializeOwned;
use std::{future::Future, pin::Pin, time::Duration};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Behaviour of one job type.
///
/// `job_type` must be stable and unique across a registry: it is the key
/// persisted with every row. Delivery is at-least-once, so `handle` may run
/// more than once for the same payload.
pub trait JobHandler: Send + Sync + 'static {
    fn job_type(&self) -> &'static str;

    /// Runs the job against the raw payload bytes stored with the row.
    fn handle<'a>(&'a self, payload: &'a [u8]) -> BoxFuture<'a, Result<(), JobError>>;

    /// Attempts allowed before the row is marked `failed`.
    fn max_attempts(&self) -> i32 {
        3
    }

    /// Delay added to `available_at` after a failed attempt.
    fn retry_after(&self) -> Duration {
        Duration::from_secs(2 * 60)
    }
}

/// Decodes a JSON payload into the handler's parameter type.
pub fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T, JobError> {
    serde_json::from_slice(payload).map_err(JobError::from)
}

pub fn boxed<'a, T>(fut: impl Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Email {
        to: String,
    }

    #[test]
    fn decode_payload_reads_typed_struct() {
        let email: Email = decode_payload(br#"{"to":"a@b.com"}"#).unwrap();
        assert_eq!(email.to, "a@b.com");
    }

    #[test]
    fn decode_payload_reports_bad_payload() {
        let err = decode_payload::<Email>(b"[1,2]").unwrap_err();
        assert!(err.message.starts_with("bad payload"), "{}", err.message);
    }
}
