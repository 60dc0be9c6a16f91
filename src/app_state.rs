use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::services::{
    cache::ResponseCache,
    catalog::CatalogStore,
    clock::Clock,
    discovery::{Discovery, DiscoveryError, SitemapClient},
    fetcher::PageFetcher,
    orchestrator::{ScrapeOrchestrator, Scraper},
    queue::ScrapeQueue,
    worker::QueueWorker,
};

const SITEMAP_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub queue: Arc<dyn ScrapeQueue>,
    pub catalog: Arc<dyn CatalogStore>,
    pub cache: Arc<ResponseCache>,
    pub scraper: Arc<dyn Scraper>,
    pub worker: Arc<QueueWorker>,
    pub discovery: Arc<Discovery>,
}

impl AppState {
    /// Wire the scrape pipeline around the given stores, fetcher and clock.
    pub fn new(
        db: PgPool,
        config: AppConfig,
        queue: Arc<dyn ScrapeQueue>,
        catalog: Arc<dyn CatalogStore>,
        fetcher: Arc<dyn PageFetcher>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DiscoveryError> {
        let cache = Arc::new(ResponseCache::new(config.cache_ttl()));
        let scraper: Arc<dyn Scraper> = Arc::new(ScrapeOrchestrator::new(
            fetcher.clone(),
            cache.clone(),
            clock.clone(),
            config.pre_fetch_delay(),
        ));
        let worker = Arc::new(QueueWorker::new(
            queue.clone(),
            catalog.clone(),
            scraper.clone(),
            clock,
            config.worker_policy(),
        ));
        let discovery = Arc::new(Discovery::new(
            fetcher,
            SitemapClient::new(SITEMAP_TIMEOUT)?,
            queue.clone(),
            catalog.clone(),
        ));

        Ok(Self {
            db,
            config: Arc::new(config),
            queue,
            catalog,
            cache,
            scraper,
            worker,
            discovery,
        })
    }
}
