use async_trait::async_trait;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::models::queue::{QueueEntry, QueueStats, QueueStatus};
use crate::services::queue::{QueueError, ScrapeQueue};

const ENTRY_COLUMNS: &str =
    "url, status, retry_count, error_message, force_rescrape, created_at, updated_at";

/// Insert URLs not yet present in any status, keeping submission order.
pub async fn enqueue_urls(pool: &PgPool, urls: &[String]) -> Result<u64, sqlx::Error> {
    let urls = dedupe(urls);
    if urls.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO scrape_queue (url)
        SELECT u FROM UNNEST($1::text[]) WITH ORDINALITY AS t(u, ord)
        ORDER BY ord
        ON CONFLICT (url) DO NOTHING
        "#,
    )
    .bind(&urls)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Insert or reset URLs for a forced re-scrape. Rows currently being
/// processed are not touched.
pub async fn enqueue_rescrape_urls(pool: &PgPool, urls: &[String]) -> Result<u64, sqlx::Error> {
    let urls = dedupe(urls);
    if urls.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO scrape_queue (url, force_rescrape)
        SELECT u, TRUE FROM UNNEST($1::text[]) WITH ORDINALITY AS t(u, ord)
        ORDER BY ord
        ON CONFLICT (url) DO UPDATE
            SET status = 'pending',
                force_rescrape = TRUE,
                error_message = NULL,
                updated_at = NOW()
            WHERE scrape_queue.status <> 'processing'
        "#,
    )
    .bind(&urls)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Atomically claim the oldest pending entry. Concurrent callers skip rows
/// locked by each other, so an entry is handed out once.
pub async fn claim_next(pool: &PgPool) -> Result<Option<QueueEntry>, QueueError> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE scrape_queue
        SET status = 'processing', updated_at = NOW()
        WHERE id = (
            SELECT id FROM scrape_queue
            WHERE status = 'pending'
            ORDER BY created_at, id
            FOR UPDATE SKIP LOCKED
            LIMIT 1
        )
        RETURNING {ENTRY_COLUMNS}
        "#
    ))
    .fetch_optional(pool)
    .await?;

    row.map(|r| entry_from_row(&r)).transpose()
}

pub async fn mark_done(pool: &PgPool, url: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE scrape_queue
        SET status = 'done', error_message = NULL, force_rescrape = FALSE, updated_at = NOW()
        WHERE url = $1
        "#,
    )
    .bind(url)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_failed(pool: &PgPool, url: &str, error_message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE scrape_queue
        SET status = 'failed', error_message = $2, updated_at = NOW()
        WHERE url = $1
        "#,
    )
    .bind(url)
    .bind(error_message)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn mark_pending(pool: &PgPool, url: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE scrape_queue
        SET status = 'pending', retry_count = retry_count + 1, updated_at = NOW()
        WHERE url = $1
        "#,
    )
    .bind(url)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn reset_stuck(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE scrape_queue SET status = 'pending', updated_at = NOW() WHERE status = 'processing'",
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn retry_failed(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE scrape_queue
        SET status = 'pending', retry_count = retry_count + 1, updated_at = NOW()
        WHERE status = 'failed'
        "#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn queue_stats(pool: &PgPool) -> Result<QueueStats, QueueError> {
    let rows = sqlx::query("SELECT status, COUNT(*) AS count FROM scrape_queue GROUP BY status")
        .fetch_all(pool)
        .await?;

    let mut stats = QueueStats::default();
    for row in rows {
        let status: String = row.try_get("status")?;
        let count: i64 = row.try_get("count")?;
        stats.add(parse_status(status)?, count);
    }
    Ok(stats)
}

/// Delete entries, optionally restricted to one status.
pub async fn clear(pool: &PgPool, status: Option<QueueStatus>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM scrape_queue WHERE $1::text IS NULL OR status = $1")
        .bind(status.map(|s| s.to_string()))
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn get_entry(pool: &PgPool, url: &str) -> Result<Option<QueueEntry>, QueueError> {
    let row = sqlx::query(&format!(
        "SELECT {ENTRY_COLUMNS} FROM scrape_queue WHERE url = $1"
    ))
    .bind(url)
    .fetch_optional(pool)
    .await?;

    row.map(|r| entry_from_row(&r)).transpose()
}

fn entry_from_row(row: &PgRow) -> Result<QueueEntry, QueueError> {
    let status: String = row.try_get("status")?;
    Ok(QueueEntry {
        url: row.try_get("url")?,
        status: parse_status(status)?,
        retry_count: row.try_get("retry_count")?,
        error_message: row.try_get("error_message")?,
        force_rescrape: row.try_get("force_rescrape")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_status(raw: String) -> Result<QueueStatus, QueueError> {
    raw.parse().map_err(|_| QueueError::InvalidStatus(raw))
}

fn dedupe(urls: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.iter()
        .filter(|u| seen.insert(u.as_str()))
        .cloned()
        .collect()
}

/// PostgreSQL-backed scrape queue.
#[derive(Clone)]
pub struct PgScrapeQueue {
    pool: PgPool,
}

impl PgScrapeQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScrapeQueue for PgScrapeQueue {
    async fn enqueue(&self, urls: &[String]) -> Result<u64, QueueError> {
        Ok(enqueue_urls(&self.pool, urls).await?)
    }

    async fn enqueue_rescrape(&self, urls: &[String]) -> Result<u64, QueueError> {
        Ok(enqueue_rescrape_urls(&self.pool, urls).await?)
    }

    async fn dequeue_next(&self) -> Result<Option<QueueEntry>, QueueError> {
        claim_next(&self.pool).await
    }

    async fn mark_done(&self, url: &str) -> Result<(), QueueError> {
        Ok(mark_done(&self.pool, url).await?)
    }

    async fn mark_failed(&self, url: &str, error_message: &str) -> Result<(), QueueError> {
        Ok(mark_failed(&self.pool, url, error_message).await?)
    }

    async fn mark_pending(&self, url: &str) -> Result<(), QueueError> {
        Ok(mark_pending(&self.pool, url).await?)
    }

    async fn reset_stuck(&self) -> Result<u64, QueueError> {
        Ok(reset_stuck(&self.pool).await?)
    }

    async fn retry_failed(&self) -> Result<u64, QueueError> {
        Ok(retry_failed(&self.pool).await?)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        queue_stats(&self.pool).await
    }

    async fn clear(&self, status: Option<QueueStatus>) -> Result<u64, QueueError> {
        Ok(clear(&self.pool, status).await?)
    }

    async fn get(&self, url: &str) -> Result<Option<QueueEntry>, QueueError> {
        get_entry(&self.pool, url).await
    }
}
