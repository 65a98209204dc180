//! API server entry point.

use api::config::Config;
use queue::WorkerPool;
use store::PostgresStockStore;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Create stores and application state
    let components = if let Some(ref url) = config.database_url {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(url)
            .await
            .expect("failed to connect to database");
        PostgresStockStore::new(pool.clone())
            .run_migrations()
            .await
            .expect("failed to run migrations");
        tracing::info!("using PostgreSQL stores");
        api::create_postgres_state(&config, pool)
    } else {
        tracing::info!("no DATABASE_URL set, using in-memory stores");
        api::create_in_memory_state(&config)
    };

    // 4. Recover jobs orphaned by a previous run, then start the workers
    let recovered = components
        .queue
        .recover_stalled()
        .await
        .expect("stall recovery failed");
    if recovered > 0 {
        tracing::warn!(recovered, "requeued jobs from previous run");
    }
    let pool = WorkerPool::start(
        components.queue.clone(),
        components.processor.clone(),
        config.worker_pool_size,
    );
    tracing::info!(workers = config.worker_pool_size, "worker pool started");

    // 5. Build and serve the application
    let app = api::create_app(components.state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // 6. Drain in-flight jobs within the grace period
    pool.shutdown(config.shutdown_grace).await;
    tracing::info!("server shut down gracefully");
}
