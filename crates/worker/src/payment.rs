//! Payment gateway seam.
//!
//! The payment side-effect is pluggable: production wires the no-op gateway
//! (the real charge happens in a separate system), dev environments can
//! inject random failures, and tests script exact failure sequences.

use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use crate::OrderJobPayload;

/// Errors produced by a payment gateway. All of them are transient from the
/// worker's point of view.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway did not answer in time.
    #[error("payment gateway timeout - please retry")]
    Timeout,

    /// The gateway answered with a retryable error.
    #[error("Payment gateway error: {0}")]
    Gateway(String),
}

/// The payment side-effect applied once per confirmed order.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the order amount. Failures are retried by the queue after
    /// the worker has released any reserved stock.
    async fn charge(&self, payload: &OrderJobPayload) -> Result<(), PaymentError>;
}

/// Production default: the charge is a no-op success.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPaymentGateway;

#[async_trait]
impl PaymentGateway for NoopPaymentGateway {
    async fn charge(&self, _payload: &OrderJobPayload) -> Result<(), PaymentError> {
        Ok(())
    }
}

/// Dev-mode gateway failing randomly with a configured probability.
#[derive(Debug, Clone, Copy)]
pub struct FlakyPaymentGateway {
    failure_probability: f64,
}

impl FlakyPaymentGateway {
    /// Creates a gateway that times out with the given probability (0.0–1.0).
    pub fn new(failure_probability: f64) -> Self {
        Self {
            failure_probability: failure_probability.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl PaymentGateway for FlakyPaymentGateway {
    async fn charge(&self, payload: &OrderJobPayload) -> Result<(), PaymentError> {
        if rand::random::<f64>() < self.failure_probability {
            tracing::debug!(order_id = %payload.order_id, "simulated payment timeout");
            return Err(PaymentError::Timeout);
        }
        Ok(())
    }
}

/// Test gateway failing a scripted number of times before succeeding.
#[derive(Debug, Default)]
pub struct ScriptedPaymentGateway {
    failures_left: AtomicU32,
    charges: AtomicU32,
}

impl ScriptedPaymentGateway {
    /// Creates a gateway that times out for the first `n` charges.
    pub fn failing_times(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            charges: AtomicU32::new(0),
        }
    }

    /// Creates a gateway that times out on every charge.
    pub fn always_failing() -> Self {
        Self::failing_times(u32::MAX)
    }

    /// Returns the number of charge calls seen so far.
    pub fn charge_count(&self) -> u32 {
        self.charges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for ScriptedPaymentGateway {
    async fn charge(&self, _payload: &OrderJobPayload) -> Result<(), PaymentError> {
        self.charges.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if failed {
            Err(PaymentError::Timeout)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{OrderId, ProductId, StockId, UserId};
    use domain::Money;

    fn payload() -> OrderJobPayload {
        OrderJobPayload {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            product_id: ProductId::new(),
            stock_id: StockId::new(),
            quantity: 1,
            price_at_purchase: Money::from_cents(100),
            is_vip: false,
        }
    }

    #[tokio::test]
    async fn test_noop_always_succeeds() {
        let gateway = NoopPaymentGateway;
        assert!(gateway.charge(&payload()).await.is_ok());
    }

    #[tokio::test]
    async fn test_flaky_with_certainty() {
        let always = FlakyPaymentGateway::new(1.0);
        let err = always.charge(&payload()).await.unwrap_err();
        assert_eq!(err.to_string(), "payment gateway timeout - please retry");

        let never = FlakyPaymentGateway::new(0.0);
        assert!(never.charge(&payload()).await.is_ok());
    }

    #[tokio::test]
    async fn test_scripted_fails_then_succeeds() {
        let gateway = ScriptedPaymentGateway::failing_times(2);
        assert!(gateway.charge(&payload()).await.is_err());
        assert!(gateway.charge(&payload()).await.is_err());
        assert!(gateway.charge(&payload()).await.is_ok());
        assert_eq!(gateway.charge_count(), 3);
    }

    #[test]
    fn test_timeout_message_is_stable() {
        // The dead-letter path records this string as the order's failure
        // reason; clients match on it.
        assert_eq!(
            PaymentError::Timeout.to_string(),
            "payment gateway timeout - please retry"
        );
    }
}
