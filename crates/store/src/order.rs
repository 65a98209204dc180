use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{NewOrder, Order, OrderStatus};

use crate::Result;

/// Outcome of a terminal status write.
///
/// Terminal statuses are sticky: the first terminal write wins and any later
/// one is a no-op, reported as `AlreadyTerminal` so callers can observe the
/// race for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalWrite {
    /// The status transition was applied.
    Applied,
    /// The order already carried the given terminal status; nothing changed.
    AlreadyTerminal(OrderStatus),
}

/// Store of order records and their status transitions.
///
/// Intake creates orders as `Pending`; the worker or the dead-letter observer
/// move them exactly once to `Confirmed` or `Failed`.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Creates a new order in `Pending` status and returns the stored record.
    async fn create_pending(&self, order: NewOrder) -> Result<Order>;

    /// Loads an order by ID. Returns `None` if it does not exist.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Marks an order `Confirmed`.
    ///
    /// Returns [`crate::StoreError::OrderNotFound`] for unknown orders.
    async fn mark_confirmed(&self, order_id: OrderId) -> Result<TerminalWrite>;

    /// Marks an order `Failed` with the given reason.
    ///
    /// Idempotent against already-terminal orders; the stored reason of the
    /// first terminal write is preserved.
    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<TerminalWrite>;

    /// Lists a user's orders, newest first.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;
}
