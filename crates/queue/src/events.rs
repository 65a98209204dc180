use async_trait::async_trait;

use crate::Job;

/// Observer of job lifecycle transitions.
///
/// The queue invokes subscribers inline at each transition: delivery is
/// serial with respect to a single job, while different jobs may deliver
/// concurrently from different workers. Default implementations are no-ops
/// so observers implement only the events they care about.
#[async_trait]
pub trait QueueSubscriber: Send + Sync {
    /// A job became eligible for dispatch (enqueue or delayed promotion).
    async fn on_waiting(&self, _job: &Job) {}

    /// A worker claimed the job and started an attempt.
    async fn on_active(&self, _job: &Job) {}

    /// The handler acknowledged completion.
    async fn on_completed(&self, _job: &Job) {}

    /// The job moved to the failed set, either by exhausting retries or by
    /// a terminal discard. This is the dead-letter notification.
    async fn on_failed(&self, _job: &Job, _reason: &str) {}

    /// An active job exceeded the stall timeout and was returned to waiting.
    async fn on_stalled(&self, _job: &Job) {}
}
