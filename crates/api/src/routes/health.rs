//! Service health endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use crate::AppState;

/// Snapshot of the order queue, taken from its durable store.
#[derive(Serialize)]
pub struct QueueHealth {
    pub waiting: usize,
    pub active: usize,
    pub delayed: usize,
    pub failed: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Absent when the job store is unreachable.
    pub queue: Option<QueueHealth>,
}

/// GET /health — liveness plus the current order-queue depths.
///
/// Reading the counts goes through the queue's durable store, so the probe
/// doubles as a connectivity check on the backing database. An unreachable
/// store reports `degraded` rather than failing the probe outright.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    match state.queue.counts().await {
        Ok(counts) => Json(HealthResponse {
            status: "ok",
            queue: Some(QueueHealth {
                waiting: counts.waiting,
                active: counts.active,
                delayed: counts.delayed,
                failed: counts.failed,
            }),
        }),
        Err(e) => {
            tracing::error!(error = %e, "health probe could not reach the job store");
            Json(HealthResponse {
                status: "degraded",
                queue: None,
            })
        }
    }
}
