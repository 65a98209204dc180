use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::{Job, Queue};

/// Outcome of a single handler invocation.
///
/// Handlers return a tagged value instead of throwing: the queue translates
/// `Retry` into backoff scheduling, `Discard` into an immediate move to the
/// failed set, and `Completed` into acknowledgment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job is done; acknowledge it.
    Completed,
    /// Terminal failure; skip remaining retries and dead-letter the job.
    Discard(String),
    /// Transient failure; reschedule with backoff (or fail once attempts
    /// are exhausted).
    Retry(String),
}

/// A unit of work executed by the worker pool.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Processes one claimed job. Must be idempotent under redelivery.
    async fn handle(&self, job: &Job) -> JobOutcome;
}

/// A pool of workers consuming from a queue.
///
/// Each worker is a tokio task processing strictly sequentially: claim,
/// run the handler under the soft timeout, apply the outcome, repeat.
/// A companion monitor task periodically recovers stalled jobs.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    monitor: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
}

impl WorkerPool {
    /// Starts `size` workers plus the stall monitor.
    pub fn start(queue: Arc<Queue>, handler: Arc<dyn JobHandler>, size: usize) -> Self {
        let (shutdown, _) = watch::channel(false);

        let workers = (0..size)
            .map(|worker_id| {
                let queue = queue.clone();
                let handler = handler.clone();
                let mut shutdown_rx = shutdown.subscribe();
                tokio::spawn(async move {
                    tracing::debug!(worker_id, "worker started");
                    loop {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        match queue.next_job().await {
                            Ok(Some(job)) => Self::process_one(&queue, handler.as_ref(), job).await,
                            Ok(None) => {
                                tokio::select! {
                                    () = queue.wait_for_job() => {}
                                    _ = shutdown_rx.changed() => {}
                                }
                            }
                            Err(e) => {
                                tracing::error!(worker_id, error = %e, "failed to fetch next job");
                                tokio::time::sleep(queue.config().poll_interval).await;
                            }
                        }
                    }
                    tracing::debug!(worker_id, "worker stopped");
                })
            })
            .collect();

        let monitor = {
            let queue = queue.clone();
            let mut shutdown_rx = shutdown.subscribe();
            let scan_interval = queue.config().stall_timeout.max(Duration::from_millis(100)) / 2;
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = tokio::time::sleep(scan_interval) => {}
                        _ = shutdown_rx.changed() => break,
                    }
                    match queue.recover_stalled().await {
                        Ok(0) => {}
                        Ok(n) => tracing::warn!(recovered = n, "stalled jobs returned to waiting"),
                        Err(e) => tracing::error!(error = %e, "stall scan failed"),
                    }
                }
            })
        };

        Self {
            workers,
            monitor,
            shutdown,
        }
    }

    async fn process_one(queue: &Queue, handler: &dyn JobHandler, job: Job) {
        let started = Instant::now();
        let outcome =
            match tokio::time::timeout(queue.config().handler_timeout, handler.handle(&job)).await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    // Soft timeout exceeded: treat as stalled and redeliver.
                    if let Err(e) = queue.mark_stalled(&job).await {
                        tracing::error!(job_id = %job.id, error = %e, "failed to stall job");
                    }
                    return;
                }
            };

        metrics::histogram!("queue_job_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        if let Err(e) = queue.finish(&job, outcome).await {
            tracing::error!(job_id = %job.id, error = %e, "failed to record job outcome");
        }
    }

    /// Signals shutdown and waits for in-flight handlers to finish.
    ///
    /// Workers that have not finished within the grace period are aborted;
    /// their jobs come back through the stall mechanism.
    pub async fn shutdown(self, grace: Duration) {
        let _ = self.shutdown.send(true);
        self.monitor.abort();

        let deadline = Instant::now() + grace;
        for mut worker in self.workers {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, &mut worker).await.is_err() {
                tracing::warn!("worker did not stop within grace period, aborting");
                worker.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InMemoryJobStore, JobOptions, JobState, QueueConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        processed: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _job: &Job) -> JobOutcome {
            self.processed.fetch_add(1, Ordering::SeqCst);
            JobOutcome::Completed
        }
    }

    struct SlowHandler;

    #[async_trait]
    impl JobHandler for SlowHandler {
        async fn handle(&self, _job: &Job) -> JobOutcome {
            tokio::time::sleep(Duration::from_secs(60)).await;
            JobOutcome::Completed
        }
    }

    async fn wait_until<F: Fn() -> bool>(deadline: Duration, predicate: F) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if predicate() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        predicate()
    }

    #[tokio::test]
    async fn pool_drains_the_queue() {
        let queue = Arc::new(Queue::new(
            Arc::new(InMemoryJobStore::new()),
            QueueConfig::named("test"),
        ));
        let handler = Arc::new(CountingHandler {
            processed: AtomicUsize::new(0),
        });

        for n in 0..8 {
            queue
                .enqueue(serde_json::json!({"n": n}), JobOptions::default())
                .await
                .unwrap();
        }

        let pool = WorkerPool::start(queue.clone(), handler.clone(), 4);
        assert!(
            wait_until(Duration::from_secs(5), || {
                handler.processed.load(Ordering::SeqCst) == 8
            })
            .await
        );
        pool.shutdown(Duration::from_secs(1)).await;

        let counts = queue.counts().await.unwrap();
        assert_eq!(counts.completed, 8);
        assert_eq!(counts.waiting, 0);
    }

    #[tokio::test]
    async fn overrunning_handler_is_stalled_and_redelivered() {
        let config = QueueConfig {
            handler_timeout: Duration::from_millis(50),
            ..QueueConfig::named("test")
        };
        let queue = Arc::new(Queue::new(Arc::new(InMemoryJobStore::new()), config));

        let job = queue
            .enqueue(serde_json::json!({}), JobOptions::default())
            .await
            .unwrap();

        let pool = WorkerPool::start(queue.clone(), Arc::new(SlowHandler), 1);

        // The handler overruns its soft timeout; the job must come back to
        // waiting (and then be claimed again by the same worker).
        let start = Instant::now();
        let mut redelivered = false;
        while start.elapsed() < Duration::from_secs(5) {
            let stored = queue.get_job(job.id).await.unwrap();
            if stored.is_some_and(|j| j.attempts >= 2 || j.state == JobState::Waiting) {
                redelivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(redelivered);

        pool.shutdown(Duration::from_millis(100)).await;
    }
}
