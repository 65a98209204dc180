//! Dead-letter observer: turns permanently failed jobs into failed orders.

use std::sync::Arc;

use async_trait::async_trait;
use queue::{Job, QueueSubscriber};
use store::{OrderStore, StoreError, TerminalWrite};

use crate::OrderJobPayload;

/// Queue subscriber reacting to the dead-letter path.
///
/// `mark_failed` is idempotent against terminal orders, so it is safe when
/// the worker already recorded the failure itself. Stalls are observed for
/// monitoring only.
pub struct DeadLetterObserver {
    orders: Arc<dyn OrderStore>,
}

impl DeadLetterObserver {
    /// Creates an observer over the given order store.
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }
}

#[async_trait]
impl QueueSubscriber for DeadLetterObserver {
    async fn on_failed(&self, job: &Job, reason: &str) {
        let payload = match OrderJobPayload::from_job(job) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "dead-lettered job has no readable payload");
                return;
            }
        };

        match self.orders.mark_failed(payload.order_id, reason).await {
            Ok(TerminalWrite::Applied) => {
                metrics::counter!("orders_dead_lettered").increment(1);
                tracing::warn!(
                    order_id = %payload.order_id,
                    job_id = %job.id,
                    %reason,
                    "order failed via dead-letter path"
                );
            }
            Ok(TerminalWrite::AlreadyTerminal(status)) => {
                tracing::debug!(
                    order_id = %payload.order_id,
                    %status,
                    "order already terminal when dead-lettered"
                );
            }
            Err(StoreError::OrderNotFound(order_id)) => {
                tracing::error!(critical = true, %order_id, "order missing at terminal write");
            }
            Err(e) => {
                tracing::error!(
                    order_id = %payload.order_id,
                    error = %e,
                    "failed to record dead-lettered order"
                );
            }
        }
    }

    async fn on_stalled(&self, job: &Job) {
        metrics::counter!("orders_jobs_stalled").increment(1);
        tracing::warn!(job_id = %job.id, attempts = job.attempts, "order job stalled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::{JobId, ProductId, StockId, UserId};
    use domain::{Money, NewOrder, OrderStatus};
    use queue::JobState;
    use store::InMemoryOrderStore;

    fn job_with_payload(payload: &OrderJobPayload) -> Job {
        let now = Utc::now();
        Job {
            id: JobId::new(),
            queue: "orders".to_string(),
            payload: payload.to_value().unwrap(),
            priority: 1,
            attempts: 5,
            max_attempts: 5,
            state: JobState::Failed,
            failure_reason: Some("payment gateway timeout - please retry".to_string()),
            enqueued_seq: 1,
            available_at: now,
            started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn pending_order(orders: &InMemoryOrderStore) -> OrderJobPayload {
        let order = orders
            .create_pending(NewOrder {
                user_id: UserId::new(),
                product_id: ProductId::new(),
                stock_id: StockId::new(),
                quantity: 1,
                price_at_purchase: Money::from_cents(100),
                is_vip: false,
            })
            .await
            .unwrap();
        OrderJobPayload::from_order(&order)
    }

    #[tokio::test]
    async fn failed_event_marks_order_failed_with_reason() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let observer = DeadLetterObserver::new(orders.clone());
        let payload = pending_order(&orders).await;

        observer
            .on_failed(
                &job_with_payload(&payload),
                "payment gateway timeout - please retry",
            )
            .await;

        let order = orders.get(payload.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert_eq!(
            order.failure_reason.as_deref(),
            Some("payment gateway timeout - please retry")
        );
    }

    #[tokio::test]
    async fn failed_event_is_idempotent_on_terminal_orders() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let observer = DeadLetterObserver::new(orders.clone());
        let payload = pending_order(&orders).await;

        orders.mark_confirmed(payload.order_id).await.unwrap();
        observer
            .on_failed(&job_with_payload(&payload), "too late")
            .await;

        let order = orders.get(payload.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.failure_reason.is_none());
    }

    #[tokio::test]
    async fn unreadable_payload_is_tolerated() {
        let orders = Arc::new(InMemoryOrderStore::new());
        let observer = DeadLetterObserver::new(orders.clone());
        let payload = pending_order(&orders).await;

        let mut job = job_with_payload(&payload);
        job.payload = serde_json::json!({"not": "an order"});
        observer.on_failed(&job, "boom").await;

        // The order is untouched; the bad payload only produced a log line.
        let order = orders.get(payload.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }
}
