//! Stock records and snapshots.

use chrono::{DateTime, Utc};
use common::{ProductId, StockId};
use serde::{Deserialize, Serialize};

/// Persistent stock quantity for a product.
///
/// `version` increases by exactly 1 per successful mutation and is the
/// predicate of the compare-and-reserve operation; `(id, version)` uniquely
/// identifies a snapshot. `quantity` never goes negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub id: StockId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    /// Returns the snapshot view of this record.
    pub fn snapshot(&self) -> StockSnapshot {
        StockSnapshot {
            stock_id: self.id,
            product_id: self.product_id,
            quantity: self.quantity,
            version: self.version,
        }
    }
}

/// Point-in-time view of a stock record as observed by a reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub stock_id: StockId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub version: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_record() {
        let record = StockRecord {
            id: StockId::new(),
            product_id: ProductId::new(),
            quantity: 100,
            version: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let snapshot = record.snapshot();
        assert_eq!(snapshot.stock_id, record.id);
        assert_eq!(snapshot.quantity, 100);
        assert_eq!(snapshot.version, 3);
    }
}
