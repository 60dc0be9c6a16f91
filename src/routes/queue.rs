use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::errors::AppError;
use crate::models::admin::{
    ClearQuery, ClearResponse, DiscoverBrandRequest, DiscoverSitemapRequest, DiscoveryAccepted,
    EnqueueRequest, EnqueueResponse, QueueStatusResponse, RescrapeRequest, RescrapeResponse,
    RetryFailedResponse, StartResponse, StopResponse,
};
use crate::services::discovery::{DiscoveryKind, DiscoveryTask, TaskStatus};
use crate::services::queue::enqueue_unseen;

/// POST /api/v1/admin/queue — add URLs that are neither queued nor cataloged.
pub async fn enqueue(
    State(state): State<AppState>,
    Json(request): Json<EnqueueRequest>,
) -> Result<Json<EnqueueResponse>, AppError> {
    request.validate()?;

    let outcome = enqueue_unseen(state.queue.as_ref(), state.catalog.as_ref(), &request.urls).await?;
    tracing::info!(
        submitted = outcome.submitted,
        queued = outcome.queued,
        skipped_known = outcome.skipped_known,
        skipped_queued = outcome.skipped_queued,
        "URLs enqueued"
    );

    let stats = state.queue.stats().await?;
    Ok(Json(EnqueueResponse { outcome, stats }))
}

/// POST /api/v1/admin/queue/discover/brand
pub async fn discover_brand(
    State(state): State<AppState>,
    Json(request): Json<DiscoverBrandRequest>,
) -> Result<(StatusCode, Json<DiscoveryAccepted>), AppError> {
    request.validate()?;

    let brand = request.brand.trim();
    let source = if brand.starts_with("http://") || brand.starts_with("https://") {
        brand.to_string()
    } else if brand.chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_') {
        state.config.brand_url(brand)
    } else {
        return Err(AppError::Validation(format!(
            "brand must be a slug or a URL, got {:?}",
            brand
        )));
    };

    Ok(accepted(&state, DiscoveryKind::Brand, source).await)
}

/// POST /api/v1/admin/queue/discover/sitemap
pub async fn discover_sitemap(
    State(state): State<AppState>,
    Json(request): Json<DiscoverSitemapRequest>,
) -> Result<(StatusCode, Json<DiscoveryAccepted>), AppError> {
    request.validate()?;

    let source = request
        .url
        .unwrap_or_else(|| state.config.default_sitemap_url());
    Ok(accepted(&state, DiscoveryKind::Sitemap, source).await)
}

async fn accepted(
    state: &AppState,
    kind: DiscoveryKind,
    source: String,
) -> (StatusCode, Json<DiscoveryAccepted>) {
    let task_id = state.discovery.spawn(kind, source.clone()).await;
    (
        StatusCode::ACCEPTED,
        Json(DiscoveryAccepted {
            task_id,
            kind,
            source,
            status: TaskStatus::Running,
        }),
    )
}

/// GET /api/v1/admin/discovery/{task_id}
pub async fn discovery_status(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<DiscoveryTask>, AppError> {
    state
        .discovery
        .tasks()
        .get(task_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("discovery task {}", task_id)))
}

/// GET /api/v1/admin/queue/status
pub async fn queue_status(
    State(state): State<AppState>,
) -> Result<Json<QueueStatusResponse>, AppError> {
    let stats = state.queue.stats().await?;
    Ok(Json(QueueStatusResponse {
        total: stats.total(),
        stats,
        worker: state.worker.session().snapshot().await,
        discovery: state.discovery.tasks().list().await,
    }))
}

/// POST /api/v1/admin/queue/start
pub async fn start(State(state): State<AppState>) -> Result<Json<StartResponse>, AppError> {
    let outcome = state.worker.start().await?;
    Ok(Json(StartResponse {
        outcome,
        worker: state.worker.session().snapshot().await,
    }))
}

/// POST /api/v1/admin/queue/stop — takes effect after the in-flight scrape.
pub async fn stop(State(state): State<AppState>) -> Json<StopResponse> {
    let was_running = state.worker.stop();
    Json(StopResponse {
        was_running,
        worker: state.worker.session().snapshot().await,
    })
}

/// POST /api/v1/admin/queue/retry-failed
pub async fn retry_failed(
    State(state): State<AppState>,
) -> Result<Json<RetryFailedResponse>, AppError> {
    let requeued = state.queue.retry_failed().await?;
    tracing::info!(requeued, "Failed entries returned to pending");
    Ok(Json(RetryFailedResponse {
        requeued,
        stats: state.queue.stats().await?,
    }))
}

/// POST /api/v1/admin/queue/rescrape — force a re-scrape of incomplete records.
pub async fn rescrape(
    State(state): State<AppState>,
    Json(request): Json<RescrapeRequest>,
) -> Result<Json<RescrapeResponse>, AppError> {
    request.validate()?;

    let urls: Vec<String> = state
        .catalog
        .get_incomplete(request.limit)
        .await?
        .into_iter()
        .map(|record| record.source_url)
        .collect();
    let queued = if urls.is_empty() {
        0
    } else {
        state.queue.enqueue_rescrape(&urls).await?
    };
    tracing::info!(candidates = urls.len(), queued, "Incomplete records queued for rescrape");

    Ok(Json(RescrapeResponse {
        candidates: urls.len(),
        queued,
        stats: state.queue.stats().await?,
    }))
}

/// DELETE /api/v1/admin/queue?status=
pub async fn clear(
    State(state): State<AppState>,
    Query(query): Query<ClearQuery>,
) -> Result<Json<ClearResponse>, AppError> {
    let deleted = state.queue.clear(query.status).await?;
    tracing::info!(deleted, status = ?query.status, "Queue cleared");
    Ok(Json(ClearResponse {
        deleted,
        status: query.status,
    }))
}
