//! Order records and the order status state machine.

use chrono::{DateTime, Utc};
use common::{OrderId, ProductId, StockId, UserId};
use serde::{Deserialize, Serialize};

use crate::{DomainError, Money};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Pending ──► Confirmed (terminal)
/// Pending ──► Failed    (terminal)
/// ```
///
/// Terminal states are permanent; the order store refuses to overwrite them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order accepted and enqueued, outcome not yet decided.
    #[default]
    Pending,

    /// Stock reserved and payment applied (terminal state).
    Confirmed,

    /// Order failed with a recorded reason (terminal state).
    Failed,
}

impl OrderStatus {
    /// Returns true if this is a terminal status (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Failed)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub stock_id: StockId,
    pub quantity: u32,
    pub price_at_purchase: Money,
    pub status: OrderStatus,
    pub is_vip: bool,
    /// Set only when the order is Failed.
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated input for creating a pending order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub stock_id: StockId,
    pub quantity: u32,
    pub price_at_purchase: Money,
    pub is_vip: bool,
}

/// A raw order submission as received from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub stock_id: StockId,
    pub quantity: u32,
    pub price_at_purchase: Money,
}

impl OrderRequest {
    /// Validates the submission.
    ///
    /// Failures are returned synchronously to the caller and never enqueued.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.quantity < 1 {
            return Err(DomainError::InvalidQuantity { got: self.quantity });
        }
        if self.price_at_purchase.is_negative() {
            return Err(DomainError::NegativePrice {
                cents: self.price_at_purchase.cents(),
            });
        }
        Ok(())
    }
}
