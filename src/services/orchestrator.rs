use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::perfume::{ExtractedPerfume, ScrapedPerfume};
use crate::services::cache::ResponseCache;
use crate::services::clock::Clock;
use crate::services::extractor;
use crate::services::fetcher::{headline_block, FetchError, PageFetcher};

/// Extra markers of an interstitial page whose heading leaked into the name.
const NAME_ARTIFACTS: [&str; 3] = ["just a moment", "attention required", "captcha"];

/// Turns one product URL into a validated record.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape_one(&self, url: &str) -> Result<ScrapedPerfume, ScrapeError>;

    /// Like `scrape_one`, but never answers from a memoized result.
    async fn scrape_fresh(&self, url: &str) -> Result<ScrapedPerfume, ScrapeError>;
}

/// Fetch, extract, validate and memoize.
pub struct ScrapeOrchestrator {
    fetcher: Arc<dyn PageFetcher>,
    cache: Arc<ResponseCache>,
    clock: Arc<dyn Clock>,
    pre_fetch_delay: Duration,
}

impl ScrapeOrchestrator {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        cache: Arc<ResponseCache>,
        clock: Arc<dyn Clock>,
        pre_fetch_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            cache,
            clock,
            pre_fetch_delay,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    async fn fetch_and_extract(&self, url: &str) -> Result<ScrapedPerfume, ScrapeError> {
        self.clock.sleep(self.pre_fetch_delay).await;

        let page = self.fetcher.fetch(url).await?;
        let extracted = extractor::extract(&page.html, url);
        let perfume = validate(url, extracted)?;

        info!(
            url,
            id = %perfume.id,
            name = %perfume.name,
            brand = %perfume.brand,
            notes = perfume.notes.top.len() + perfume.notes.heart.len() + perfume.notes.base.len(),
            accords = perfume.accords.len(),
            "Scraped perfume"
        );

        self.cache.set(url, perfume.clone()).await;
        Ok(perfume)
    }
}

#[async_trait]
impl Scraper for ScrapeOrchestrator {
    async fn scrape_one(&self, url: &str) -> Result<ScrapedPerfume, ScrapeError> {
        if let Some(cached) = self.cache.get(url).await {
            debug!(url, "Serving scrape result from cache");
            return Ok(cached);
        }
        self.fetch_and_extract(url).await
    }

    async fn scrape_fresh(&self, url: &str) -> Result<ScrapedPerfume, ScrapeError> {
        if self.cache.invalidate(url).await {
            debug!(url, "Dropped cached scrape result for forced re-scrape");
        }
        self.fetch_and_extract(url).await
    }
}

/// Enforce the required pair and attach identity fields.
pub fn validate(url: &str, extracted: ExtractedPerfume) -> Result<ScrapedPerfume, ScrapeError> {
    let name = extracted
        .name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ScrapeError::InvalidData(format!("no perfume name found at {}", url)))?;
    let brand = extracted
        .brand
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| ScrapeError::InvalidData(format!("no brand found at {}", url)))?;

    let lowered = name.to_lowercase();
    let artifact = headline_block(&name).or_else(|| {
        NAME_ARTIFACTS
            .iter()
            .find(|phrase| lowered.contains(*phrase))
            .copied()
    });
    if let Some(artifact) = artifact {
        return Err(ScrapeError::InvalidData(format!(
            "name \"{}\" looks like a block page ({})",
            name, artifact
        )));
    }

    Ok(ScrapedPerfume {
        id: Uuid::new_v4(),
        source_url: url.to_string(),
        name,
        brand,
        year: extracted.year,
        perfumer: extracted.perfumer,
        perfumer_image: extracted.perfumer_image,
        gender: extracted.gender,
        concentration: extracted.concentration.map(|c| c.to_string()),
        notes: extracted.notes,
        accords: extracted.accords,
        description: extracted.description,
        image_url: extracted.image_url,
        rating: extracted.rating,
        longevity: extracted.longevity,
        sillage: extracted.sillage,
        season_usage: extracted.season_usage,
        scraped_at: Utc::now(),
    })
}

/// Classification the worker loop switches on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScrapeError {
    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Scrape failed: {0}")]
    Failed(String),
}

impl ScrapeError {
    /// Short label used in logs and error samples.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RateLimited(_) => "rate_limited",
            Self::InvalidData(_) => "invalid_data",
            Self::Timeout(_) => "timeout",
            Self::Navigation(_) => "navigation",
            Self::Failed(_) => "failed",
        }
    }
}

impl From<FetchError> for ScrapeError {
    fn from(err: FetchError) -> Self {
        let message = err.to_string();
        match err {
            FetchError::RateLimited(_) => Self::RateLimited(message),
            FetchError::Timeout { .. } => Self::Timeout(message),
            FetchError::Navigation(_) => Self::Navigation(message),
            FetchError::Launch(_) | FetchError::Browser(_) => Self::Failed(message),
        }
    }
}
