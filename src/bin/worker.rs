use perfume_catalog::{
    config::AppConfig,
    db::{self, PgCatalog, PgScrapeQueue},
    services::{
        cache::ResponseCache,
        catalog::CatalogStore,
        clock::TokioClock,
        fetcher::ChromiumFetcher,
        orchestrator::ScrapeOrchestrator,
        queue::{enqueue_unseen, ScrapeQueue},
        worker::QueueWorker,
    },
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Drain mode: optionally enqueue the URLs given as arguments, then process
/// the queue until it is empty or Ctrl-C pauses the loop.
#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting perfume scrape worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize services
    tracing::info!("Initializing services");
    let queue: Arc<dyn ScrapeQueue> = Arc::new(PgScrapeQueue::new(db_pool.clone()));
    let catalog: Arc<dyn CatalogStore> = Arc::new(PgCatalog::new(db_pool));
    let clock = Arc::new(TokioClock);
    let scraper = Arc::new(ScrapeOrchestrator::new(
        Arc::new(ChromiumFetcher::new(config.fetcher_config())),
        Arc::new(ResponseCache::new(config.cache_ttl())),
        clock.clone(),
        config.pre_fetch_delay(),
    ));
    let worker = Arc::new(QueueWorker::new(
        queue.clone(),
        catalog.clone(),
        scraper,
        clock,
        config.worker_policy(),
    ));

    let urls: Vec<String> = std::env::args().skip(1).collect();
    if !urls.is_empty() {
        match enqueue_unseen(queue.as_ref(), catalog.as_ref(), &urls).await {
            Ok(outcome) => tracing::info!(
                submitted = outcome.submitted,
                queued = outcome.queued,
                skipped_known = outcome.skipped_known,
                skipped_queued = outcome.skipped_queued,
                "Command-line URLs enqueued"
            ),
            Err(e) => {
                tracing::error!(error = %e, "Failed to enqueue command-line URLs");
                std::process::exit(1);
            }
        }
    }

    {
        let worker = worker.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, finishing the current URL");
                worker.stop();
            }
        });
    }

    tracing::info!("Worker ready, draining scrape queue");

    match worker.run_until_drained().await {
        Ok(snapshot) => tracing::info!(
            processed = snapshot.processed,
            succeeded = snapshot.succeeded,
            failed = snapshot.failed,
            rate_limited = snapshot.rate_limited,
            skipped = snapshot.skipped,
            "Worker finished"
        ),
        Err(e) => {
            tracing::error!(error = %e, "Worker could not start");
            std::process::exit(1);
        }
    }
}
