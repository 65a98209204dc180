//! The job payload carried through the queue for each order.

use common::{OrderId, ProductId, StockId, UserId};
use domain::{Money, Order};
use queue::Job;
use serde::{Deserialize, Serialize};

/// Everything the processor needs to settle one order.
///
/// The queue stores this as opaque JSON; producers and the processor agree
/// on the shape here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderJobPayload {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub stock_id: StockId,
    pub quantity: u32,
    pub price_at_purchase: Money,
    pub is_vip: bool,
}

impl OrderJobPayload {
    /// Builds the payload for a freshly created pending order.
    pub fn from_order(order: &Order) -> Self {
        Self {
            order_id: order.id,
            user_id: order.user_id,
            product_id: order.product_id,
            stock_id: order.stock_id,
            quantity: order.quantity,
            price_at_purchase: order.price_at_purchase,
            is_vip: order.is_vip,
        }
    }

    /// Encodes the payload for enqueueing.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Decodes the payload from a claimed job.
    pub fn from_job(job: &Job) -> serde_json::Result<Self> {
        serde_json::from_value(job.payload.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_roundtrip() {
        let payload = OrderJobPayload {
            order_id: OrderId::new(),
            user_id: UserId::new(),
            product_id: ProductId::new(),
            stock_id: StockId::new(),
            quantity: 5,
            price_at_purchase: Money::from_cents(9999),
            is_vip: true,
        };

        let value = payload.to_value().unwrap();
        let decoded: OrderJobPayload = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, payload);
    }
}
