use async_trait::async_trait;
use common::ProductId;
use domain::{NewProduct, Product};

use crate::Result;

/// Store of catalog products.
///
/// Catalog mutations are admin-facing and last-write-wins; they are not part
/// of the order hot path.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Creates a product and returns the stored record.
    async fn create(&self, product: NewProduct) -> Result<Product>;

    /// Loads a product by ID. Returns `None` if it does not exist.
    async fn get(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Lists all products.
    async fn list(&self) -> Result<Vec<Product>>;

    /// Replaces a product's fields (last-write-wins).
    async fn update(&self, product_id: ProductId, product: NewProduct) -> Result<Product>;
}
