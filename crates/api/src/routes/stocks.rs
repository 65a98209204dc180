//! Admin catalog endpoints: products, stocks and the joined browse view.
//!
//! These sit outside the order hot path; mutations are last-write-wins and
//! make no concurrency promises beyond the stock version bump.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, StockId};
use domain::{Money, NewProduct, Product, StockRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub unit_price_cents: i64,
    pub description: Option<String>,
    #[serde(default)]
    pub image_urls: Vec<String>,
}

#[derive(Deserialize)]
pub struct CreateStockRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub description: Option<String>,
    pub image_urls: Vec<String>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            name: product.name,
            unit_price_cents: product.unit_price.cents(),
            description: product.description,
            image_urls: product.image_urls,
        }
    }
}

#[derive(Serialize)]
pub struct StockResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: i64,
    pub version: i64,
}

impl From<StockRecord> for StockResponse {
    fn from(record: StockRecord) -> Self {
        Self {
            id: record.id.to_string(),
            product_id: record.product_id.to_string(),
            quantity: record.quantity,
            version: record.version,
        }
    }
}

#[derive(Serialize)]
pub struct ProductWithStockResponse {
    #[serde(flatten)]
    pub product: ProductResponse,
    pub stock: Option<StockResponse>,
}

// -- Product handlers --

/// POST /products — create a catalog product.
#[tracing::instrument(skip(state, req))]
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state
        .products
        .create(NewProduct {
            name: req.name,
            unit_price: Money::from_cents(req.unit_price_cents),
            description: req.description,
            image_urls: req.image_urls,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products — list the catalog.
#[tracing::instrument(skip(state))]
pub async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.products.list().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /products/{id} — one product.
#[tracing::instrument(skip(state))]
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id = ProductId::from_uuid(parse_uuid(&id)?);
    let product = state
        .products
        .get(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;
    Ok(Json(product.into()))
}

/// GET /products-with-stock — catalog joined with current stock levels.
#[tracing::instrument(skip(state))]
pub async fn products_with_stock(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductWithStockResponse>>, ApiError> {
    let products = state.products.list().await?;

    let mut responses = Vec::with_capacity(products.len());
    for product in products {
        let stock = state.stocks.get_by_product(product.id).await?;
        responses.push(ProductWithStockResponse {
            product: product.into(),
            stock: stock.map(Into::into),
        });
    }
    Ok(Json(responses))
}

// -- Stock handlers --

/// POST /stocks — create the stock record for a product.
#[tracing::instrument(skip(state, req))]
pub async fn create_stock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateStockRequest>,
) -> Result<(StatusCode, Json<StockResponse>), ApiError> {
    let product_id = ProductId::from_uuid(req.product_id);
    if state.products.get(product_id).await?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Product {product_id} not found"
        )));
    }

    let record = state.stocks.create(product_id, req.quantity).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /stocks — list stock records.
#[tracing::instrument(skip(state))]
pub async fn list_stocks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<StockResponse>>, ApiError> {
    let records = state.stocks.list().await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// GET /stocks/{id} — current snapshot of one stock record.
#[tracing::instrument(skip(state))]
pub async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StockResponse>, ApiError> {
    let stock_id = StockId::from_uuid(parse_uuid(&id)?);
    let snapshot = state.stocks.read(stock_id).await?;
    Ok(Json(StockResponse {
        id: snapshot.stock_id.to_string(),
        product_id: snapshot.product_id.to_string(),
        quantity: snapshot.quantity,
        version: snapshot.version,
    }))
}

/// PUT /stocks/{id}/quantity — admin override of the quantity.
#[tracing::instrument(skip(state, req))]
pub async fn set_stock_quantity(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetQuantityRequest>,
) -> Result<Json<StockResponse>, ApiError> {
    let stock_id = StockId::from_uuid(parse_uuid(&id)?);
    let record = state.stocks.set_quantity(stock_id, req.quantity).await?;
    Ok(Json(record.into()))
}

fn parse_uuid(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
