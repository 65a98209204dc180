//! Prometheus exposition endpoint.
//!
//! Renders the recorder installed at startup: order counters
//! (`orders_submitted`, `orders_confirmed`, `orders_business_failures`,
//! `orders_dead_lettered`), queue counters (`queue_jobs_*`) and the
//! `queue_job_duration_seconds` histogram.

use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;

/// Prometheus text exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics — scrape target for the order core.
pub async fn render(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        handle.render(),
    )
}
