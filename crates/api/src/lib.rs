//! HTTP API server for the order-processing core.
//!
//! Provides the order submission/retrieval endpoints and the admin catalog
//! API, with structured logging (tracing) and Prometheus metrics. Worker
//! pool and queue are wired here; authentication happens upstream and
//! arrives as verified-identity headers.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use queue::{InMemoryJobStore, JobStore, PostgresJobStore, Queue};
use sqlx::PgPool;
use store::{
    InMemoryOrderStore, InMemoryProductStore, InMemoryStockStore, OrderStore, PostgresOrderStore,
    PostgresProductStore, PostgresStockStore, ProductStore, StockStore,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use worker::{
    DeadLetterObserver, FlakyPaymentGateway, NoopPaymentGateway, OrderIntake, OrderProcessor,
    PaymentGateway,
};

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub intake: OrderIntake,
    pub orders: Arc<dyn OrderStore>,
    pub stocks: Arc<dyn StockStore>,
    pub products: Arc<dyn ProductStore>,
    pub queue: Arc<Queue>,
}

/// Everything `main` (or a test harness) needs to run the service.
pub struct AppComponents {
    pub state: Arc<AppState>,
    pub queue: Arc<Queue>,
    pub processor: Arc<OrderProcessor>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::create))
        .route("/orders", get(routes::orders::list))
        .route("/orders/{id}", get(routes::orders::get))
        .route("/products", post(routes::stocks::create_product))
        .route("/products", get(routes::stocks::list_products))
        .route("/products/{id}", get(routes::stocks::get_product))
        .route("/products-with-stock", get(routes::stocks::products_with_stock))
        .route("/stocks", post(routes::stocks::create_stock))
        .route("/stocks", get(routes::stocks::list_stocks))
        .route("/stocks/{id}", get(routes::stocks::get_stock))
        .route("/stocks/{id}/quantity", put(routes::stocks::set_stock_quantity))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Wires stores, queue, worker components and state together.
fn assemble(
    config: &Config,
    stocks: Arc<dyn StockStore>,
    orders: Arc<dyn OrderStore>,
    products: Arc<dyn ProductStore>,
    job_store: Arc<dyn JobStore>,
) -> AppComponents {
    let mut queue = Queue::new(job_store, config.queue_config());
    queue.subscribe(Arc::new(DeadLetterObserver::new(orders.clone())));
    let queue = Arc::new(queue);

    let payment: Arc<dyn PaymentGateway> = if config.payment_failure_probability > 0.0 {
        tracing::warn!(
            probability = config.payment_failure_probability,
            "using flaky payment gateway (dev mode)"
        );
        Arc::new(FlakyPaymentGateway::new(config.payment_failure_probability))
    } else {
        Arc::new(NoopPaymentGateway)
    };

    let processor = Arc::new(
        OrderProcessor::new(stocks.clone(), orders.clone(), payment)
            .with_payment_timeout(config.payment_timeout),
    );
    let intake = OrderIntake::new(stocks.clone(), orders.clone(), queue.clone())
        .with_vip_priority(config.vip_priority);

    let state = Arc::new(AppState {
        intake,
        orders,
        stocks,
        products,
        queue: queue.clone(),
    });

    AppComponents {
        state,
        queue,
        processor,
    }
}

/// Creates application components backed by in-memory stores.
pub fn create_in_memory_state(config: &Config) -> AppComponents {
    assemble(
        config,
        Arc::new(InMemoryStockStore::new()),
        Arc::new(InMemoryOrderStore::new()),
        Arc::new(InMemoryProductStore::new()),
        Arc::new(InMemoryJobStore::new()),
    )
}

/// Creates application components backed by PostgreSQL.
pub fn create_postgres_state(config: &Config, pool: PgPool) -> AppComponents {
    assemble(
        config,
        Arc::new(PostgresStockStore::new(pool.clone())),
        Arc::new(PostgresOrderStore::new(pool.clone())),
        Arc::new(PostgresProductStore::new(pool.clone())),
        Arc::new(PostgresJobStore::new(pool, config.queue_name.clone())),
    )
}
