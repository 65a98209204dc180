use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, StockId, UserId};
use domain::{NewOrder, NewProduct, Order, OrderStatus, Product, StockRecord, StockSnapshot};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    order::{OrderStore, TerminalWrite},
    product::ProductStore,
    stock::StockStore,
};

/// In-memory stock store implementation for testing.
///
/// Provides the same compare-and-reserve contract as the PostgreSQL
/// implementation: reads and conditional updates take the lock separately,
/// so concurrent reservers genuinely race on the version counter.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    records: Arc<RwLock<HashMap<StockId, StockRecord>>>,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory stock store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn create(&self, product_id: ProductId, initial_quantity: i64) -> Result<StockRecord> {
        if initial_quantity < 0 {
            return Err(StoreError::InvalidQuantity {
                requested: initial_quantity,
            });
        }

        let mut records = self.records.write().await;
        if records.values().any(|r| r.product_id == product_id) {
            return Err(StoreError::StockExists(product_id));
        }

        let now = Utc::now();
        let record = StockRecord {
            id: StockId::new(),
            product_id,
            quantity: initial_quantity,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn read(&self, stock_id: StockId) -> Result<StockSnapshot> {
        let records = self.records.read().await;
        records
            .get(&stock_id)
            .map(StockRecord::snapshot)
            .ok_or(StoreError::StockNotFound(stock_id))
    }

    async fn get_by_product(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.product_id == product_id)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<_> = records.values().cloned().collect();
        all.sort_by_key(|r| r.created_at);
        Ok(all)
    }

    async fn compare_and_reserve(
        &self,
        stock_id: StockId,
        expected_version: i64,
        quantity: i64,
    ) -> Result<StockSnapshot> {
        if quantity <= 0 {
            return Err(StoreError::InvalidQuantity {
                requested: quantity,
            });
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&stock_id)
            .ok_or(StoreError::StockNotFound(stock_id))?;

        if record.version != expected_version {
            return Err(StoreError::VersionConflict {
                stock_id,
                expected: expected_version,
                actual: record.version,
            });
        }

        if record.quantity < quantity {
            return Err(StoreError::Insufficient {
                stock_id,
                available: record.quantity,
                requested: quantity,
            });
        }

        record.quantity -= quantity;
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(record.snapshot())
    }

    async fn release(&self, stock_id: StockId, quantity: i64) -> Result<StockSnapshot> {
        if quantity <= 0 {
            return Err(StoreError::InvalidQuantity {
                requested: quantity,
            });
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&stock_id)
            .ok_or(StoreError::StockNotFound(stock_id))?;

        record.quantity += quantity;
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(record.snapshot())
    }

    async fn set_quantity(&self, stock_id: StockId, quantity: i64) -> Result<StockRecord> {
        if quantity < 0 {
            return Err(StoreError::InvalidQuantity {
                requested: quantity,
            });
        }

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&stock_id)
            .ok_or(StoreError::StockNotFound(stock_id))?;

        record.quantity = quantity;
        record.version += 1;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}

/// In-memory order store implementation for testing.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    async fn mark_terminal(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<TerminalWrite> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;

        if order.status.is_terminal() {
            return Ok(TerminalWrite::AlreadyTerminal(order.status));
        }

        order.status = status;
        order.failure_reason = reason.map(String::from);
        order.updated_at = Utc::now();
        Ok(TerminalWrite::Applied)
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_pending(&self, order: NewOrder) -> Result<Order> {
        let now = Utc::now();
        let record = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            product_id: order.product_id,
            stock_id: order.stock_id,
            quantity: order.quantity,
            price_at_purchase: order.price_at_purchase,
            status: OrderStatus::Pending,
            is_vip: order.is_vip,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };

        let mut orders = self.orders.write().await;
        orders.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let orders = self.orders.read().await;
        Ok(orders.get(&order_id).cloned())
    }

    async fn mark_confirmed(&self, order_id: OrderId) -> Result<TerminalWrite> {
        self.mark_terminal(order_id, OrderStatus::Confirmed, None)
            .await
    }

    async fn mark_failed(&self, order_id: OrderId, reason: &str) -> Result<TerminalWrite> {
        self.mark_terminal(order_id, OrderStatus::Failed, Some(reason))
            .await
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result: Vec<_> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}

/// In-memory product store implementation for testing.
#[derive(Clone, Default)]
pub struct InMemoryProductStore {
    products: Arc<RwLock<HashMap<ProductId, Product>>>,
}

impl InMemoryProductStore {
    /// Creates a new empty in-memory product store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductStore for InMemoryProductStore {
    async fn create(&self, product: NewProduct) -> Result<Product> {
        let now = Utc::now();
        let record = Product {
            id: ProductId::new(),
            name: product.name,
            unit_price: product.unit_price,
            description: product.description,
            image_urls: product.image_urls,
            created_at: now,
            updated_at: now,
        };

        let mut products = self.products.write().await;
        products.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, product_id: ProductId) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(&product_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let products = self.products.read().await;
        let mut all: Vec<_> = products.values().cloned().collect();
        all.sort_by_key(|p| p.created_at);
        Ok(all)
    }

    async fn update(&self, product_id: ProductId, product: NewProduct) -> Result<Product> {
        let mut products = self.products.write().await;
        let record = products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        record.name = product.name;
        record.unit_price = product.unit_price;
        record.description = product.description;
        record.image_urls = product.image_urls;
        record.updated_at = Utc::now();
        Ok(record.clone())
    }
}
