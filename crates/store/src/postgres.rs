use async_trait::async_trait;
use chrono::Utc;
use common::{OrderId, ProductId, StockId, UserId};
use domain::{
    Money, NewOrder, NewProduct, Order, OrderStatus, Product, StockRecord, StockSnapshot,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, StoreError,
    order::{OrderStore, TerminalWrite},
    product::ProductStore,
    stock::StockStore,
};

/// PostgreSQL-backed stock store.
///
/// The compare-and-reserve predicate is expressed directly in the UPDATE
/// statement, so the version check and the decrement are a single atomic
/// round trip.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_record(row: PgRow) -> Result<StockRecord> {
        Ok(StockRecord {
            id: StockId::from_uuid(row.try_get::<Uuid, _>("id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    async fn create(&self, product_id: ProductId, initial_quantity: i64) -> Result<StockRecord> {
        if initial_quantity < 0 {
            return Err(StoreError::InvalidQuantity {
                requested: initial_quantity,
            });
        }

        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO stocks (id, product_id, quantity, version, created_at, updated_at)
            VALUES ($1, $2, $3, 1, $4, $4)
            RETURNING id, product_id, quantity, version, created_at, updated_at
            "#,
        )
        .bind(StockId::new().as_uuid())
        .bind(product_id.as_uuid())
        .bind(initial_quantity)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_stock_product")
            {
                return StoreError::StockExists(product_id);
            }
            StoreError::Database(e)
        })?;

        Self::row_to_record(row)
    }

    async fn read(&self, stock_id: StockId) -> Result<StockSnapshot> {
        let row = sqlx::query("SELECT product_id, quantity, version FROM stocks WHERE id = $1")
            .bind(stock_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::StockNotFound(stock_id))?;

        Ok(StockSnapshot {
            stock_id,
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            version: row.try_get("version")?,
        })
    }

    async fn get_by_product(&self, product_id: ProductId) -> Result<Option<StockRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, product_id, quantity, version, created_at, updated_at
            FROM stocks
            WHERE product_id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn list(&self) -> Result<Vec<StockRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, quantity, version, created_at, updated_at
            FROM stocks
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_record).collect()
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

        let row = sqlx::query(
            r#"
            UPDATE stocks
            SET quantity = quantity - $3, version = version + 1, updated_at = $4
            WHERE id = $1 AND version = $2 AND quantity >= $3
            RETURNING product_id, quantity, version
            "#,
        )
        .bind(stock_id.as_uuid())
        .bind(expected_version)
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(StockSnapshot {
                stock_id,
                product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
                quantity: row.try_get("quantity")?,
                version: row.try_get("version")?,
            });
        }

        // The predicate failed; re-read once to classify which leg did.
        let current = self.read(stock_id).await?;
        if current.version != expected_version {
            Err(StoreError::VersionConflict {
                stock_id,
                expected: expected_version,
                actual: current.version,
            })
        } else {
            Err(StoreError::Insufficient {
                stock_id,
                available: current.quantity,
                requested: quantity,
            })
        }
    }

    async fn release(&self, stock_id: StockId, quantity: i64) -> Result<StockSnapshot> {
        if quantity <= 0 {
            return Err(StoreError::InvalidQuantity {
                requested: quantity,
            });
        }

        let row = sqlx::query(
            r#"
            UPDATE stocks
            SET quantity = quantity + $2, version = version + 1, updated_at = $3
            WHERE id = $1
            RETURNING product_id, quantity, version
            "#,
        )
        .bind(stock_id.as_uuid())
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::StockNotFound(stock_id))?;

        Ok(StockSnapshot {
            stock_id,
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            quantity: row.try_get("quantity")?,
            version: row.try_get("version")?,
        })
    }

    async fn set_quantity(&self, stock_id: StockId, quantity: i64) -> Result<StockRecord> {
        if quantity < 0 {
            return Err(StoreError::InvalidQuantity {
                requested: quantity,
            });
        }

        let row = sqlx::query(
            r#"
            UPDATE stocks
            SET quantity = $2, version = version + 1, updated_at = $3
            WHERE id = $1
            RETURNING id, product_id, quantity, version, created_at, updated_at
            "#,
        )
        .bind(stock_id.as_uuid())
        .bind(quantity)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::StockNotFound(stock_id))?;

        Self::row_to_record(row)
    }
}

/// PostgreSQL-backed order store.
///
/// Terminal stickiness is enforced by the status predicate in the UPDATE:
/// only a `PENDING` row can transition, so racing terminal writers resolve
/// to exactly one `Applied`.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status_str: String = row.try_get("status")?;
        let status = match status_str.as_str() {
            "PENDING" => OrderStatus::Pending,
            "CONFIRMED" => OrderStatus::Confirmed,
            _ => OrderStatus::Failed,
        };

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            product_id: ProductId::from_uuid(row.try_get::<Uuid, _>("product_id")?),
            stock_id: StockId::from_uuid(row.try_get::<Uuid, _>("stock_id")?),
            quantity: row.try_get::<i64, _>("quantity")? as u32,
            price_at_purchase: Money::from_cents(row.try_get("price_at_purchase_cents")?),
            status,
            is_vip: row.try_get("is_vip")?,
            failure_reason: row.try_get("failure_reason")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn mark_terminal(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        reason: Option<&str>,
    ) -> Result<TerminalWrite> {
        let updated = sqlx::query(
            r#"
            UPDATE orders
            SET status = $2, failure_reason = $3, updated_at = $4
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(status.as_str())
        .bind(reason)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 1 {
            return Ok(TerminalWrite::Applied);
        }

        let existing: Option<String> =
            sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
                .bind(order_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        match existing.as_deref() {
            None => Err(StoreError::OrderNotFound(order_id)),
            Some("CONFIRMED") => Ok(TerminalWrite::AlreadyTerminal(OrderStatus::Confirmed)),
            Some(_) => Ok(TerminalWrite::AlreadyTerminal(OrderStatus::Failed)),
        }
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create_pending(&self, order: NewOrder) -> Result<Order> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO orders
                (id, user_id, product_id, stock_id, quantity, price_at_purchase_cents,
                 status, is_vip, failure_reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', $7, NULL, $8, $8)
            RETURNING id, user_id, product_id, stock_id, quantity, price_at_purchase_cents,
                      status, is_vip, failure_reason, created_at, updated_at
            "#,
        )
        .bind(OrderId::new().as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.product_id.as_uuid())
        .bind(order.stock_id.as_uuid())
        .bind(order.quantity as i64)
        .bind(order.price_at_purchase.cents())
        .bind(order.is_vip)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_order(row)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, product_id, stock_id, quantity, price_at_purchase_cents,
                   status, is_vip, failure_reason, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
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
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, product_id, stock_id, quantity, price_at_purchase_cents,
                   status, is_vip, failure_reason, created_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }
}

/// PostgreSQL-backed product store.
#[derive(Clone)]
pub struct PostgresProductStore {
    pool: PgPool,
}

impl PostgresProductStore {
    /// Creates a new PostgreSQL product store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let image_urls: serde_json::Value = row.try_get("image_urls")?;
        Ok(Product {
            id: ProductId::from_uuid(row.try_get::<Uuid, _>("id")?),
            name: row.try_get("name")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            description: row.try_get("description")?,
            image_urls: serde_json::from_value(image_urls)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ProductStore for PostgresProductStore {
    async fn create(&self, product: NewProduct) -> Result<Product> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO products (id, name, unit_price_cents, description, image_urls,
                                  created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING id, name, unit_price_cents, description, image_urls, created_at, updated_at
            "#,
        )
        .bind(ProductId::new().as_uuid())
        .bind(&product.name)
        .bind(product.unit_price.cents())
        .bind(&product.description)
        .bind(serde_json::to_value(&product.image_urls)?)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Self::row_to_product(row)
    }

    async fn get(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, unit_price_cents, description, image_urls, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, unit_price_cents, description, image_urls, created_at, updated_at
            FROM products
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn update(&self, product_id: ProductId, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, unit_price_cents = $3, description = $4, image_urls = $5,
                updated_at = $6
            WHERE id = $1
            RETURNING id, name, unit_price_cents, description, image_urls, created_at, updated_at
            "#,
        )
        .bind(product_id.as_uuid())
        .bind(&product.name)
        .bind(product.unit_price.cents())
        .bind(&product.description)
        .bind(serde_json::to_value(&product.image_urls)?)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::ProductNotFound(product_id))?;

        Self::row_to_product(row)
    }
}
