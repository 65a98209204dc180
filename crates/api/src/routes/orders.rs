//! Order submission and retrieval endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::OrderId;
use domain::{Money, Order, OrderRequest};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub stock_id: Uuid,
    pub quantity: u32,
    pub price_at_purchase_cents: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub product_name: String,
    pub product_description: Option<String>,
    /// Current stock snapshot, absent if the stock record disappeared.
    pub available_stock: Option<i64>,
    pub quantity: u32,
    pub price_at_purchase_cents: i64,
    pub status: String,
    pub is_vip_order: bool,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderResponse {
    /// Enriches an order record with catalog details and the live stock
    /// quantity.
    async fn assemble(state: &AppState, order: Order) -> Self {
        let product = state.products.get(order.product_id).await.ok().flatten();
        let available_stock = state
            .stocks
            .read(order.stock_id)
            .await
            .ok()
            .map(|s| s.quantity);

        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            product_name: product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            product_description: product.and_then(|p| p.description),
            available_stock,
            quantity: order.quantity,
            price_at_purchase_cents: order.price_at_purchase.cents(),
            status: order.status.to_string(),
            is_vip_order: order.is_vip,
            failure_reason: order.failure_reason,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders — submit an order; responds with the pending record.
#[tracing::instrument(skip(state, req), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let request = OrderRequest {
        stock_id: common::StockId::from_uuid(req.stock_id),
        quantity: req.quantity,
        price_at_purchase: Money::from_cents(req.price_at_purchase_cents),
    };

    let order = state.intake.submit(user.submitter(), request).await?;
    let response = OrderResponse::assemble(&state, order).await;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /orders — the caller's orders, newest first.
#[tracing::instrument(skip(state), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_by_user(user.id).await?;

    let mut responses = Vec::with_capacity(orders.len());
    for order in orders {
        responses.push(OrderResponse::assemble(&state, order).await);
    }
    Ok(Json(responses))
}

/// GET /orders/{id} — one of the caller's orders.
#[tracing::instrument(skip(state), fields(user_id = %user.id))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .get(order_id)
        .await?
        .filter(|o| o.user_id == user.id)
        .ok_or_else(|| ApiError::NotFound(format!("Order {id} not found")))?;

    Ok(Json(OrderResponse::assemble(&state, order).await))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
