use common::{OrderId, ProductId, StockId};
use thiserror::Error;

/// Errors that can occur when interacting with the stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced stock record does not exist.
    #[error("Stock not found: {0}")]
    StockNotFound(StockId),

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The referenced product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// A stock record already exists for this product.
    #[error("Stock already exists for product {0}")]
    StockExists(ProductId),

    /// The reservation does not fit the remaining quantity.
    /// The stock record is left unchanged.
    #[error("Insufficient stock {stock_id}: available {available}, requested {requested}")]
    Insufficient {
        stock_id: StockId,
        available: i64,
        requested: i64,
    },

    /// The compare-and-reserve predicate failed on the version counter.
    /// Another writer mutated the record between read and update.
    #[error("Version conflict on stock {stock_id}: expected version {expected}, found {actual}")]
    VersionConflict {
        stock_id: StockId,
        expected: i64,
        actual: i64,
    },

    /// Quantity arguments must be positive.
    #[error("Invalid quantity: {requested} (must be positive)")]
    InvalidQuantity { requested: i64 },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if this error is a lost CAS race on the stock version.
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
