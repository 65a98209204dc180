//! Integration tests for dispatch ordering and retry behavior under a
//! running worker pool.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use queue::{
    InMemoryJobStore, Job, JobHandler, JobOptions, JobOutcome, Queue, QueueConfig, WorkerPool,
};

/// Records the dispatch order of payload labels, optionally holding each job
/// for a while to keep the pool saturated.
struct RecordingHandler {
    order: Arc<Mutex<Vec<String>>>,
    hold: Duration,
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn handle(&self, job: &Job) -> JobOutcome {
        let label = job.payload["label"].as_str().unwrap_or("?").to_string();
        self.order.lock().unwrap().push(label);
        tokio::time::sleep(self.hold).await;
        JobOutcome::Completed
    }
}

async fn wait_for_labels(order: &Arc<Mutex<Vec<String>>>, n: usize, deadline: Duration) {
    let start = tokio::time::Instant::now();
    while start.elapsed() < deadline {
        if order.lock().unwrap().len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "timed out waiting for {n} dispatches, saw {:?}",
        order.lock().unwrap()
    );
}

#[tokio::test]
async fn vip_wins_when_a_worker_frees_up() {
    let queue = Arc::new(Queue::new(
        Arc::new(InMemoryJobStore::new()),
        QueueConfig::named("test"),
    ));
    let order = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(RecordingHandler {
        order: order.clone(),
        hold: Duration::from_millis(150),
    });

    // Saturate both workers with long-running regular jobs.
    for label in ["regular-1", "regular-2"] {
        queue
            .enqueue(serde_json::json!({"label": label}), JobOptions::default())
            .await
            .unwrap();
    }
    let pool = WorkerPool::start(queue.clone(), handler, 2);
    wait_for_labels(&order, 2, Duration::from_secs(5)).await;

    // With the pool busy, enqueue a regular job and then a VIP job. The VIP
    // job arrived later but must dispatch first when a worker frees up.
    queue
        .enqueue(
            serde_json::json!({"label": "regular-3"}),
            JobOptions::default(),
        )
        .await
        .unwrap();
    queue
        .enqueue(
            serde_json::json!({"label": "vip-1"}),
            JobOptions::with_priority(1),
        )
        .await
        .unwrap();

    wait_for_labels(&order, 4, Duration::from_secs(5)).await;
    pool.shutdown(Duration::from_secs(1)).await;

    let order = order.lock().unwrap();
    let vip_pos = order.iter().position(|l| l == "vip-1").unwrap();
    let regular3_pos = order.iter().position(|l| l == "regular-3").unwrap();
    assert!(
        vip_pos < regular3_pos,
        "vip dispatched after regular backlog: {order:?}"
    );
}

/// Fails a fixed number of times, then succeeds.
struct FlakyHandler {
    failures_left: Mutex<u32>,
    attempts_seen: Arc<Mutex<Vec<u32>>>,
}

#[async_trait]
impl JobHandler for FlakyHandler {
    async fn handle(&self, job: &Job) -> JobOutcome {
        self.attempts_seen.lock().unwrap().push(job.attempts);
        let mut left = self.failures_left.lock().unwrap();
        if *left > 0 {
            *left -= 1;
            JobOutcome::Retry("transient glitch".into())
        } else {
            JobOutcome::Completed
        }
    }
}

#[tokio::test]
async fn transient_failures_retry_until_success() {
    let config = QueueConfig {
        backoff: queue::Backoff::exponential(Duration::from_millis(10)),
        ..QueueConfig::named("test")
    };
    let queue = Arc::new(Queue::new(Arc::new(InMemoryJobStore::new()), config));
    let attempts_seen = Arc::new(Mutex::new(Vec::new()));
    let handler = Arc::new(FlakyHandler {
        failures_left: Mutex::new(2),
        attempts_seen: attempts_seen.clone(),
    });

    let job = queue
        .enqueue(serde_json::json!({"label": "flaky"}), JobOptions::default())
        .await
        .unwrap();

    let pool = WorkerPool::start(queue.clone(), handler, 1);

    let start = tokio::time::Instant::now();
    loop {
        let stored = queue.get_job(job.id).await.unwrap().unwrap();
        if stored.state == queue::JobState::Completed {
            break;
        }
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "job never completed: {stored:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    pool.shutdown(Duration::from_secs(1)).await;

    // Three attempts total, numbered by the queue.
    assert_eq!(attempts_seen.lock().unwrap().clone(), vec![1, 2, 3]);
}
