//! Order intake: validate, persist, enqueue.

use std::sync::Arc;

use common::UserId;
use domain::{NewOrder, Order, OrderRequest};
use queue::{DEFAULT_PRIORITY, JobOptions, Queue};
use store::{OrderStore, StockStore};

use crate::{OrderJobPayload, WorkerError};

/// Queue priority assigned to VIP submissions. Lower dispatches earlier.
pub const VIP_PRIORITY: u32 = 1;

/// The verified identity attached to a submission.
///
/// Authentication happens upstream; intake only ever sees the result.
#[derive(Debug, Clone, Copy)]
pub struct Submitter {
    pub id: UserId,
    pub is_vip: bool,
}

/// Accepts order submissions and hands them to the queue.
pub struct OrderIntake {
    stocks: Arc<dyn StockStore>,
    orders: Arc<dyn OrderStore>,
    queue: Arc<Queue>,
    vip_priority: u32,
}

impl OrderIntake {
    /// Creates an intake over the given stores and queue.
    pub fn new(
        stocks: Arc<dyn StockStore>,
        orders: Arc<dyn OrderStore>,
        queue: Arc<Queue>,
    ) -> Self {
        Self {
            stocks,
            orders,
            queue,
            vip_priority: VIP_PRIORITY,
        }
    }

    /// Overrides the VIP priority value.
    pub fn with_vip_priority(mut self, vip_priority: u32) -> Self {
        self.vip_priority = vip_priority;
        self
    }

    /// Validates a submission, records a pending order and enqueues its
    /// processing job.
    ///
    /// Each submission is a distinct intent: identical payloads create
    /// distinct orders. If enqueueing fails the pending order is kept (the
    /// operator tooling recovers it) and the error is returned.
    #[tracing::instrument(skip(self, request), fields(user_id = %user.id, stock_id = %request.stock_id))]
    pub async fn submit(&self, user: Submitter, request: OrderRequest) -> Result<Order, WorkerError> {
        request.validate()?;

        // Resolve the product without populating catalog details; the
        // read also rejects unknown stock synchronously.
        let snapshot = self.stocks.read(request.stock_id).await?;

        let order = self
            .orders
            .create_pending(NewOrder {
                user_id: user.id,
                product_id: snapshot.product_id,
                stock_id: request.stock_id,
                quantity: request.quantity,
                price_at_purchase: request.price_at_purchase,
                is_vip: user.is_vip,
            })
            .await?;

        let priority = if user.is_vip {
            self.vip_priority
        } else {
            DEFAULT_PRIORITY
        };
        let payload = OrderJobPayload::from_order(&order).to_value()?;
        self.queue
            .enqueue(payload, JobOptions::with_priority(priority))
            .await?;

        metrics::counter!("orders_submitted").increment(1);
        tracing::info!(order_id = %order.id, vip = user.is_vip, "order accepted");
        Ok(order)
    }
}
