use axum::extract::State;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::models::admin::{
    BatchScrapeItem, BatchScrapeRequest, BatchScrapeResponse, CacheFlushResponse, ScrapeFailure,
    ScrapeRequest,
};
use crate::models::perfume::PerfumeRecord;
use crate::services::cache::CacheStats;

/// POST /api/v1/admin/scrape — scrape one URL now and save it.
pub async fn scrape(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Result<Json<PerfumeRecord>, AppError> {
    request.validate()?;

    let perfume = state.scraper.scrape_one(&request.url).await?;
    let stored = state.catalog.upsert(&perfume).await?;
    tracing::info!(url = %request.url, id = %stored.id, "Perfume scraped on demand");
    Ok(Json(stored))
}

/// POST /api/v1/admin/scrape/batch — up to five URLs, one after another.
pub async fn scrape_batch(
    State(state): State<AppState>,
    Json(request): Json<BatchScrapeRequest>,
) -> Result<Json<BatchScrapeResponse>, AppError> {
    request.validate()?;

    let mut results = Vec::with_capacity(request.urls.len());
    for url in request.urls {
        let item = match state.scraper.scrape_one(&url).await {
            Ok(perfume) => {
                let stored = state.catalog.upsert(&perfume).await?;
                BatchScrapeItem {
                    url,
                    perfume: Some(stored),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, kind = e.kind(), error = %e, "Batch scrape item failed");
                BatchScrapeItem {
                    url,
                    perfume: None,
                    error: Some(ScrapeFailure {
                        kind: e.kind().to_string(),
                        message: e.to_string(),
                    }),
                }
            }
        };
        results.push(item);
    }

    let succeeded = results.iter().filter(|r| r.perfume.is_some()).count();
    Ok(Json(BatchScrapeResponse {
        succeeded,
        failed: results.len() - succeeded,
        results,
    }))
}

/// GET /api/v1/admin/cache
pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}

/// DELETE /api/v1/admin/cache
pub async fn flush_cache(State(state): State<AppState>) -> Json<CacheFlushResponse> {
    let flushed = state.cache.flush().await;
    tracing::info!(flushed, "Response cache flushed");
    Json(CacheFlushResponse { flushed })
}
