use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::perfume::PerfumeRecord;
use crate::models::queue::{QueueStats, QueueStatus};
use crate::services::discovery::{DiscoveryKind, DiscoveryTask, TaskStatus};
use crate::services::queue::EnqueueOutcome;
use crate::services::worker::{SessionSnapshot, StartOutcome};

pub const MAX_BATCH_SCRAPE: usize = 5;

/// Manual submission of product URLs.
#[derive(Debug, Deserialize, Validate)]
pub struct EnqueueRequest {
    #[garde(length(min = 1, max = 1000), inner(url))]
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    #[serde(flatten)]
    pub outcome: EnqueueOutcome,
    pub stats: QueueStats,
}

/// Brand slug (`Dior`) or full brand page URL.
#[derive(Debug, Deserialize, Validate)]
pub struct DiscoverBrandRequest {
    #[garde(length(min = 1, max = 300))]
    pub brand: String,
}

/// Sitemap to walk; the site's root sitemap when omitted.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DiscoverSitemapRequest {
    #[garde(url)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryAccepted {
    pub task_id: Uuid,
    pub kind: DiscoveryKind,
    pub source: String,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize)]
pub struct QueueStatusResponse {
    pub stats: QueueStats,
    pub total: i64,
    pub worker: SessionSnapshot,
    pub discovery: Vec<DiscoveryTask>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    #[serde(flatten)]
    pub outcome: StartOutcome,
    pub worker: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub was_running: bool,
    pub worker: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct RetryFailedResponse {
    pub requeued: u64,
    pub stats: QueueStats,
}

fn default_rescrape_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize, Validate)]
pub struct RescrapeRequest {
    #[serde(default = "default_rescrape_limit")]
    #[garde(range(min = 1, max = 5000))]
    pub limit: i64,
}

impl Default for RescrapeRequest {
    fn default() -> Self {
        Self {
            limit: default_rescrape_limit(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RescrapeResponse {
    pub candidates: usize,
    pub queued: u64,
    pub stats: QueueStats,
}

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    pub status: Option<QueueStatus>,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub deleted: u64,
    pub status: Option<QueueStatus>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ScrapeRequest {
    #[garde(url)]
    pub url: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchScrapeRequest {
    #[garde(length(min = 1, max = 5), inner(url))]
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ScrapeFailure {
    pub kind: String,
    pub message: String,
}

/// Result for one URL of a batch; failures do not abort the batch.
#[derive(Debug, Serialize)]
pub struct BatchScrapeItem {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perfume: Option<PerfumeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ScrapeFailure>,
}

#[derive(Debug, Serialize)]
pub struct BatchScrapeResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchScrapeItem>,
}

#[derive(Debug, Serialize)]
pub struct CacheFlushResponse {
    pub flushed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_limit() {
        let url = "https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html".to_string();
        let ok = BatchScrapeRequest {
            urls: vec![url.clone(); MAX_BATCH_SCRAPE],
        };
        assert!(ok.validate().is_ok());

        let too_many = BatchScrapeRequest {
            urls: vec![url; MAX_BATCH_SCRAPE + 1],
        };
        assert!(too_many.validate().is_err());

        let empty = BatchScrapeRequest { urls: Vec::new() };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_enqueue_rejects_non_urls() {
        let request = EnqueueRequest {
            urls: vec!["not a url".to_string()],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_clear_query_parses_status() {
        let query: ClearQuery = serde_json::from_str(r#"{"status":"failed"}"#).unwrap();
        assert_eq!(query.status, Some(QueueStatus::Failed));
    }

    #[test]
    fn test_rescrape_limit_defaults() {
        let request: RescrapeRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(request.limit, 100);
        assert!(request.validate().is_ok());
    }
}
