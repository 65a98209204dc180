use async_trait::async_trait;
use common::{ProductId, StockId};
use domain::{StockRecord, StockSnapshot};

use crate::{Result, StoreError};

/// Upper bound on compare-and-reserve attempts inside [`StockStore::reserve`].
///
/// The loop re-reads and retries without sleeping; after the final lost race
/// the conflict surfaces to the caller as a transient failure.
pub const RESERVE_CAS_ATTEMPTS: u32 = 3;

/// Store of stock quantities with optimistic concurrency control.
///
/// All quantity mutations in the system go through this interface; nothing
/// else may write `quantity`. Mutations are linearizable per stock record:
/// `version` increases by exactly 1 per successful mutation and `quantity`
/// never goes negative.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Creates a stock record for a product with an initial quantity.
    ///
    /// At most one stock record exists per product.
    async fn create(&self, product_id: ProductId, initial_quantity: i64) -> Result<StockRecord>;

    /// Reads the current snapshot of a stock record.
    async fn read(&self, stock_id: StockId) -> Result<StockSnapshot>;

    /// Returns the stock record for a product, if one exists.
    async fn get_by_product(&self, product_id: ProductId) -> Result<Option<StockRecord>>;

    /// Lists all stock records.
    async fn list(&self) -> Result<Vec<StockRecord>>;

    /// Atomically reserves `quantity` units, conditional on the version.
    ///
    /// The update predicate is `id = stock_id AND version = expected_version
    /// AND quantity >= quantity`. On success the quantity is decremented and
    /// the version incremented by 1; the new snapshot is returned.
    ///
    /// Failures: [`StoreError::StockNotFound`], [`StoreError::VersionConflict`]
    /// when another writer won the race, [`StoreError::Insufficient`] when the
    /// remaining quantity does not cover the request (no mutation), and
    /// [`StoreError::InvalidQuantity`] for non-positive quantities.
    async fn compare_and_reserve(
        &self,
        stock_id: StockId,
        expected_version: i64,
        quantity: i64,
    ) -> Result<StockSnapshot>;

    /// Atomically returns `quantity` units to the stock.
    ///
    /// Increments quantity and version by 1. No upper cap is enforced.
    async fn release(&self, stock_id: StockId, quantity: i64) -> Result<StockSnapshot>;

    /// Admin override of the quantity (last-write-wins, still bumps version).
    ///
    /// Not part of the hot path's concurrency contract.
    async fn set_quantity(&self, stock_id: StockId, quantity: i64) -> Result<StockRecord>;

    /// Reserves `quantity` units, retrying lost CAS races with fresh reads.
    ///
    /// Bounded at [`RESERVE_CAS_ATTEMPTS`] iterations with no sleep; the last
    /// [`StoreError::VersionConflict`] is returned if every attempt loses.
    /// `Insufficient` and `NotFound` are surfaced immediately.
    async fn reserve(&self, stock_id: StockId, quantity: i64) -> Result<StockSnapshot> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let current = self.read(stock_id).await?;
            match self
                .compare_and_reserve(stock_id, current.version, quantity)
                .await
            {
                Err(e @ StoreError::VersionConflict { .. }) if attempt < RESERVE_CAS_ATTEMPTS => {
                    tracing::debug!(%stock_id, attempt, error = %e, "reserve lost CAS race, retrying");
                    continue;
                }
                result => return result,
            }
        }
    }
}
