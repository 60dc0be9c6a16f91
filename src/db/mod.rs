pub mod perfume_queries;
pub mod queue_queries;

pub use perfume_queries::PgCatalog;
pub use queue_queries::PgScrapeQueue;

use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Connections for the admin surface plus one worker claim and one catalog write.
const MAX_CONNECTIONS: u32 = 10;

/// Open the catalog/queue pool.
pub async fn init_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .connect(database_url)
        .await?;
    tracing::info!(max_connections = MAX_CONNECTIONS, "database pool ready");
    Ok(pool)
}

/// Apply `scrape_queue` and `perfumes` migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;
    tracing::info!("migrations applied");
    Ok(())
}
