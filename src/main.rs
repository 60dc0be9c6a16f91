use std::sync::Arc;

use perfume_catalog::{
    app_state::AppState,
    config::AppConfig,
    db::{self, PgCatalog, PgScrapeQueue},
    routes,
    services::{clock::TokioClock, fetcher::ChromiumFetcher},
};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing perfume-catalog server");
    if config.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set, admin routes will reject every request");
    }

    // Initialize database connection pool
    tracing::info!("Connecting to PostgreSQL database");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    // Run database migrations
    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    tracing::info!(
        headless = config.browser_headless,
        "Configuring headless browser fetcher"
    );
    let fetcher = Arc::new(ChromiumFetcher::new(config.fetcher_config()));

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(
        db_pool.clone(),
        config,
        Arc::new(PgScrapeQueue::new(db_pool.clone())),
        Arc::new(PgCatalog::new(db_pool)),
        fetcher,
        Arc::new(TokioClock),
    )
    .expect("Failed to initialize application state");
    let worker = state.worker.clone();

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1 MB limit

    tracing::info!("Starting perfume-catalog on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received, pausing queue worker");
            worker.stop();
        })
        .await
        .expect("Server error");
}
