//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use store::StoreError;
use worker::WorkerError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Missing or invalid verified-identity headers.
    Unauthorized(String),
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::StockNotFound(_)
            | StoreError::OrderNotFound(_)
            | StoreError::ProductNotFound(_) => ApiError::NotFound(err.to_string()),
            StoreError::StockExists(_)
            | StoreError::InvalidQuantity { .. }
            | StoreError::Insufficient { .. } => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Validation(e) => ApiError::BadRequest(e.to_string()),
            WorkerError::Store(e) => e.into(),
            // Enqueue failure: the pending order is kept; the caller sees
            // the infrastructure failure.
            WorkerError::Queue(e) => ApiError::Internal(e.to_string()),
            WorkerError::Serialization(e) => ApiError::Internal(e.to_string()),
        }
    }
}
