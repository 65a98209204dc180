//! Durable priority job queue with retry, dead-lettering and lifecycle events.
//!
//! Jobs carry an opaque JSON payload; the queue knows nothing about what they
//! mean. Dispatch picks the lowest priority value first and is FIFO within a
//! priority class. Failed handlers are retried with exponential backoff up to
//! a bounded attempt count, after which the job lands in the failed set (the
//! dead-letter path) and subscribers are notified.

mod backoff;
mod config;
mod error;
mod events;
mod job;
mod memory;
mod postgres;
mod queue;
mod store;
mod worker;

pub use backoff::{Backoff, BackoffKind};
pub use config::{QueueConfig, Retention};
pub use error::{QueueError, Result};
pub use events::QueueSubscriber;
pub use job::{DEFAULT_PRIORITY, Job, JobOptions, JobState};
pub use memory::InMemoryJobStore;
pub use postgres::PostgresJobStore;
pub use queue::Queue;
pub use store::{JobCounts, JobStore};
pub use worker::{JobHandler, JobOutcome, WorkerPool};
