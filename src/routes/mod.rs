pub mod auth;
pub mod health;
pub mod perfumes;
pub mod queue;
pub mod scrape;

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    middleware,
    routing::{get, post},
    BoxError, Router,
};
use tower::{
    buffer::BufferLayer, limit::RateLimitLayer, load_shed::error::Overloaded,
    load_shed::LoadShedLayer, ServiceBuilder,
};

use crate::app_state::AppState;
use crate::errors::AppError;

const ADMIN_BUFFER: usize = 256;

/// Public health route plus the admin API, which sits behind the JWT gate
/// and a single shared request rate limit.
pub fn router(state: AppState) -> Router {
    let per_minute = state.config.admin_requests_per_minute.max(1);

    let admin = Router::new()
        .route("/queue", post(queue::enqueue).delete(queue::clear))
        .route("/queue/discover/brand", post(queue::discover_brand))
        .route("/queue/discover/sitemap", post(queue::discover_sitemap))
        .route("/queue/status", get(queue::queue_status))
        .route("/queue/start", post(queue::start))
        .route("/queue/stop", post(queue::stop))
        .route("/queue/retry-failed", post(queue::retry_failed))
        .route("/queue/rescrape", post(queue::rescrape))
        .route("/discovery/{task_id}", get(queue::discovery_status))
        .route("/scrape", post(scrape::scrape))
        .route("/scrape/batch", post(scrape::scrape_batch))
        .route("/cache", get(scrape::cache_stats).delete(scrape::flush_cache))
        .route(
            "/perfumes/{id}",
            get(perfumes::get_perfume).patch(perfumes::update_perfume),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ))
        .with_state(state.clone());

    let throttled = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_throttle_error))
        .layer(BufferLayer::new(ADMIN_BUFFER))
        .layer(LoadShedLayer::new())
        .layer(RateLimitLayer::new(per_minute, Duration::from_secs(60)))
        .service(admin);

    Router::new()
        .route("/health", get(health::health_check))
        .with_state(state)
        .nest_service("/api/v1/admin", throttled)
}

async fn handle_throttle_error(err: BoxError) -> AppError {
    if err.is::<Overloaded>() {
        tracing::warn!("Admin request rejected by rate limit");
        AppError::RateLimited
    } else {
        AppError::Internal(err.to_string())
    }
}
