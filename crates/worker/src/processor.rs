//! The order worker: settles one order per claimed job.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use queue::{Job, JobHandler, JobOutcome};
use store::{OrderStore, StockStore, StoreError, TerminalWrite};

use crate::{OrderJobPayload, PaymentError, PaymentGateway};

/// Default cap on a single payment gateway call.
pub const DEFAULT_PAYMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handler for order processing jobs.
///
/// Pipeline per job: idempotency guard, stock reservation, payment
/// side-effect, confirmation. Failures split into business (terminal,
/// dead-lettered immediately) and transient (reserved stock is released,
/// then the queue retries with backoff).
pub struct OrderProcessor {
    stocks: Arc<dyn StockStore>,
    orders: Arc<dyn OrderStore>,
    payment: Arc<dyn PaymentGateway>,
    payment_timeout: Duration,
}

impl OrderProcessor {
    /// Creates a processor over the given stores and payment gateway.
    pub fn new(
        stocks: Arc<dyn StockStore>,
        orders: Arc<dyn OrderStore>,
        payment: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            stocks,
            orders,
            payment,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
        }
    }

    /// Overrides the payment timeout.
    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }

    #[tracing::instrument(skip(self, payload), fields(order_id = %payload.order_id, stock_id = %payload.stock_id))]
    async fn process(&self, payload: &OrderJobPayload) -> JobOutcome {
        // 1. Idempotency guard: a redelivered job whose order was already
        //    settled must not touch stock again.
        let order = match self.orders.get(payload.order_id).await {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::error!(critical = true, "order missing at processing time");
                return JobOutcome::Discard(
                    StoreError::OrderNotFound(payload.order_id).to_string(),
                );
            }
            Err(e) => return JobOutcome::Retry(e.to_string()),
        };
        if order.status.is_terminal() {
            tracing::debug!(status = %order.status, "order already terminal, acknowledging");
            return JobOutcome::Completed;
        }

        // 2. Reserve stock via the CAS loop.
        let quantity = payload.quantity as i64;
        match self.stocks.reserve(payload.stock_id, quantity).await {
            Ok(snapshot) => {
                tracing::debug!(
                    remaining = snapshot.quantity,
                    version = snapshot.version,
                    "stock reserved"
                );
            }
            Err(e @ (StoreError::Insufficient { .. } | StoreError::StockNotFound(_))) => {
                return self.business_failure(payload, e.to_string()).await;
            }
            Err(e) => {
                // Version-conflict exhaustion or database I/O: retryable.
                metrics::counter!("orders_reserve_conflicts").increment(1);
                return JobOutcome::Retry(e.to_string());
            }
        }

        // 3. Payment side-effect, bounded by its own timeout.
        if let Err(e) = self.charge(payload).await {
            metrics::counter!("orders_payment_failures").increment(1);
            return self.rollback_and_retry(payload, e.to_string()).await;
        }

        // 4. Confirm.
        match self.orders.mark_confirmed(payload.order_id).await {
            Ok(TerminalWrite::Applied) => {
                metrics::counter!("orders_confirmed").increment(1);
                tracing::info!("order confirmed");
                JobOutcome::Completed
            }
            Ok(TerminalWrite::AlreadyTerminal(status)) => {
                // Another attempt settled the order between the guard and
                // here; release our reservation to keep the at-most-one
                // deduction invariant.
                tracing::warn!(%status, "order settled concurrently, releasing reservation");
                self.release_reservation(payload).await;
                JobOutcome::Completed
            }
            Err(e) => self.rollback_and_retry(payload, e.to_string()).await,
        }
    }

    /// Terminal business failure: record the reason on the order and skip
    /// remaining retries. No stock was committed.
    async fn business_failure(&self, payload: &OrderJobPayload, reason: String) -> JobOutcome {
        metrics::counter!("orders_business_failures").increment(1);
        tracing::warn!(%reason, "order failed for business reasons");

        match self.orders.mark_failed(payload.order_id, &reason).await {
            Ok(_) => JobOutcome::Discard(reason),
            Err(StoreError::OrderNotFound(order_id)) => {
                tracing::error!(critical = true, %order_id, "order missing at terminal write");
                JobOutcome::Discard(reason)
            }
            Err(e) => JobOutcome::Retry(e.to_string()),
        }
    }

    /// Compensation for a transient failure after a committed reservation:
    /// release the stock, then hand the original error to the queue's retry
    /// machinery.
    async fn rollback_and_retry(&self, payload: &OrderJobPayload, error: String) -> JobOutcome {
        self.release_reservation(payload).await;
        JobOutcome::Retry(error)
    }

    async fn release_reservation(&self, payload: &OrderJobPayload) {
        let quantity = payload.quantity as i64;
        if let Err(release_err) = self.stocks.release(payload.stock_id, quantity).await {
            // The retry will re-run the whole pipeline; a failed release
            // leaves stock under-counted until operator reconciliation.
            metrics::counter!("orders_compensation_failures").increment(1);
            tracing::error!(
                critical = true,
                error = %release_err,
                quantity,
                "compensating stock release failed"
            );
        } else {
            tracing::debug!(quantity, "reservation released");
        }
    }

    async fn charge(&self, payload: &OrderJobPayload) -> Result<(), PaymentError> {
        match tokio::time::timeout(self.payment_timeout, self.payment.charge(payload)).await {
            Ok(result) => result,
            Err(_) => Err(PaymentError::Timeout),
        }
    }
}

#[async_trait]
impl JobHandler for OrderProcessor {
    async fn handle(&self, job: &Job) -> JobOutcome {
        let payload = match OrderJobPayload::from_job(job) {
            Ok(payload) => payload,
            Err(e) => {
                // A payload we cannot read will never become readable.
                tracing::error!(job_id = %job.id, error = %e, "malformed job payload");
                return JobOutcome::Discard(format!("Malformed job payload: {e}"));
            }
        };
        self.process(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;
    use domain::{Money, NewOrder, OrderStatus};
    use store::{InMemoryOrderStore, InMemoryStockStore};

    use crate::{NoopPaymentGateway, ScriptedPaymentGateway};

    struct Fixture {
        stocks: Arc<InMemoryStockStore>,
        orders: Arc<InMemoryOrderStore>,
        stock_id: common::StockId,
    }

    async fn fixture(initial_quantity: i64) -> Fixture {
        let stocks = Arc::new(InMemoryStockStore::new());
        let record = stocks
            .create(ProductId::new(), initial_quantity)
            .await
            .unwrap();
        Fixture {
            stocks,
            orders: Arc::new(InMemoryOrderStore::new()),
            stock_id: record.id,
        }
    }

    async fn pending_payload(fixture: &Fixture, quantity: u32) -> OrderJobPayload {
        let order = fixture
            .orders
            .create_pending(NewOrder {
                user_id: common::UserId::new(),
                product_id: ProductId::new(),
                stock_id: fixture.stock_id,
                quantity,
                price_at_purchase: Money::from_cents(9999),
                is_vip: false,
            })
            .await
            .unwrap();
        OrderJobPayload::from_order(&order)
    }

    fn processor(fixture: &Fixture, payment: Arc<dyn PaymentGateway>) -> OrderProcessor {
        OrderProcessor::new(fixture.stocks.clone(), fixture.orders.clone(), payment)
    }

    #[tokio::test]
    async fn happy_path_confirms_and_decrements() {
        let fixture = fixture(100).await;
        let payload = pending_payload(&fixture, 5).await;
        let processor = processor(&fixture, Arc::new(NoopPaymentGateway));

        let outcome = processor.process(&payload).await;
        assert_eq!(outcome, JobOutcome::Completed);

        let order = fixture.orders.get(payload.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);

        let snapshot = fixture.stocks.read(fixture.stock_id).await.unwrap();
        assert_eq!(snapshot.quantity, 95);
        assert_eq!(snapshot.version, 2);
    }

    #[tokio::test]
    async fn insufficient_stock_is_a_terminal_business_failure() {
        let fixture = fixture(3).await;
        let payload = pending_payload(&fixture, 5).await;
        let processor = processor(&fixture, Arc::new(NoopPaymentGateway));

        let outcome = processor.process(&payload).await;
        let JobOutcome::Discard(reason) = outcome else {
            panic!("expected discard, got {outcome:?}");
        };
        assert!(reason.contains("Insufficient"));

        let order = fixture.orders.get(payload.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        assert!(order.failure_reason.unwrap().contains("Insufficient"));

        // No mutation happened.
        let snapshot = fixture.stocks.read(fixture.stock_id).await.unwrap();
        assert_eq!(snapshot.quantity, 3);
        assert_eq!(snapshot.version, 1);
    }

    #[tokio::test]
    async fn missing_stock_is_a_terminal_business_failure() {
        let fixture = fixture(10).await;
        let mut payload = pending_payload(&fixture, 1).await;
        payload.stock_id = common::StockId::new();
        let processor = processor(&fixture, Arc::new(NoopPaymentGateway));

        let outcome = processor.process(&payload).await;
        assert!(matches!(outcome, JobOutcome::Discard(_)));

        let order = fixture.orders.get(payload.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn payment_failure_releases_reservation_and_retries() {
        let fixture = fixture(100).await;
        let payload = pending_payload(&fixture, 5).await;
        let processor = processor(&fixture, Arc::new(ScriptedPaymentGateway::always_failing()));

        let outcome = processor.process(&payload).await;
        let JobOutcome::Retry(error) = outcome else {
            panic!("expected retry, got {outcome:?}");
        };
        assert_eq!(error, "payment gateway timeout - please retry");

        // Compensation restored the quantity; the order stays pending for
        // the next attempt.
        let snapshot = fixture.stocks.read(fixture.stock_id).await.unwrap();
        assert_eq!(snapshot.quantity, 100);
        assert_eq!(snapshot.version, 3);

        let order = fixture.orders.get(payload.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_order_is_acknowledged_without_side_effects() {
        let fixture = fixture(100).await;
        let payload = pending_payload(&fixture, 5).await;
        fixture
            .orders
            .mark_confirmed(payload.order_id)
            .await
            .unwrap();

        let payment = Arc::new(ScriptedPaymentGateway::failing_times(0));
        let processor = OrderProcessor::new(
            fixture.stocks.clone(),
            fixture.orders.clone(),
            payment.clone(),
        );

        let outcome = processor.process(&payload).await;
        assert_eq!(outcome, JobOutcome::Completed);

        // Neither the stock nor the payment gateway was touched.
        let snapshot = fixture.stocks.read(fixture.stock_id).await.unwrap();
        assert_eq!(snapshot.quantity, 100);
        assert_eq!(payment.charge_count(), 0);
    }

    #[tokio::test]
    async fn missing_order_is_discarded() {
        let fixture = fixture(100).await;
        let mut payload = pending_payload(&fixture, 5).await;
        payload.order_id = common::OrderId::new();
        let processor = processor(&fixture, Arc::new(NoopPaymentGateway));

        let outcome = processor.process(&payload).await;
        assert!(matches!(outcome, JobOutcome::Discard(_)));

        let snapshot = fixture.stocks.read(fixture.stock_id).await.unwrap();
        assert_eq!(snapshot.quantity, 100);
    }

    #[tokio::test]
    async fn slow_gateway_times_out_as_transient() {
        struct HangingGateway;

        #[async_trait]
        impl PaymentGateway for HangingGateway {
            async fn charge(&self, _payload: &OrderJobPayload) -> Result<(), PaymentError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let fixture = fixture(10).await;
        let payload = pending_payload(&fixture, 1).await;
        let processor = processor(&fixture, Arc::new(HangingGateway))
            .with_payment_timeout(Duration::from_millis(20));

        let outcome = processor.process(&payload).await;
        let JobOutcome::Retry(error) = outcome else {
            panic!("expected retry, got {outcome:?}");
        };
        assert_eq!(error, "payment gateway timeout - please retry");

        let snapshot = fixture.stocks.read(fixture.stock_id).await.unwrap();
        assert_eq!(snapshot.quantity, 10);
    }
}
