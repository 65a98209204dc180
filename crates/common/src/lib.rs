//! Shared identifier types for the order-processing system.

mod ids;

pub use ids::{JobId, OrderId, ProductId, StockId, UserId};
