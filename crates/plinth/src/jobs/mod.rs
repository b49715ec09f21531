pub mod dispatch;
pub mod error;
pub mod handler;
pub mod model;
pub mod queue;
pub mod registry;
pub mod store;

pub use dispatch::{dispatch, dispatch_at, dispatch_raw, Dispatcher};
pub use error::{JobError, QueueError, StoreError};
pub use handler::{boxed, decode_payload, BoxFuture, JobHandler};
pub use model::{Job, JobState, NewJob, StateCounts};
pub use queue::{PollOutcome, Queue, QueueConfig, WorkerPool};
pub use registry::JobRegistry;
pub use store::{JobStore, JobsRepo, MemoryJobStore};
