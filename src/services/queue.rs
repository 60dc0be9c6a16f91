use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::queue::{QueueEntry, QueueStats, QueueStatus};
use crate::services::catalog::{CatalogError, CatalogStore};

/// Durable FIFO of product URLs awaiting a scrape.
///
/// Every transition is keyed by URL. `dequeue_next` is the only way into
/// `processing` and must hand a given entry to exactly one caller.
#[async_trait]
pub trait ScrapeQueue: Send + Sync {
    /// Add URLs that are not queued yet, in any status. Returns how many were added.
    async fn enqueue(&self, urls: &[String]) -> Result<u64, QueueError>;

    /// Queue URLs for a forced re-scrape: absent URLs are inserted, existing
    /// `pending`/`done`/`failed` entries are reset to `pending` with the force
    /// flag set. Entries in `processing` are left alone.
    async fn enqueue_rescrape(&self, urls: &[String]) -> Result<u64, QueueError>;

    /// Claim the oldest pending entry.
    async fn dequeue_next(&self) -> Result<Option<QueueEntry>, QueueError>;

    async fn mark_done(&self, url: &str) -> Result<(), QueueError>;

    async fn mark_failed(&self, url: &str, error_message: &str) -> Result<(), QueueError>;

    /// Rate-limit requeue; counts as a retry.
    async fn mark_pending(&self, url: &str) -> Result<(), QueueError>;

    /// Return every `processing` entry to `pending`.
    async fn reset_stuck(&self) -> Result<u64, QueueError>;

    /// Move every `failed` entry back to `pending`, counting a retry.
    async fn retry_failed(&self) -> Result<u64, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;

    async fn clear(&self, status: Option<QueueStatus>) -> Result<u64, QueueError>;

    async fn get(&self, url: &str) -> Result<Option<QueueEntry>, QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Unknown queue status: {0}")]
    InvalidStatus(String),
}

/// What happened to a batch of submitted URLs.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct EnqueueOutcome {
    pub submitted: usize,
    pub queued: u64,
    /// Already scraped into the catalog.
    pub skipped_known: usize,
    /// Already present in the queue, or repeated within the batch.
    pub skipped_queued: u64,
}

/// Enqueue only URLs outside the seen universe (queue plus catalog).
pub async fn enqueue_unseen(
    queue: &dyn ScrapeQueue,
    catalog: &dyn CatalogStore,
    urls: &[String],
) -> Result<EnqueueOutcome, QueueError> {
    let known = catalog.all_source_urls().await?;

    let mut seen = HashSet::new();
    let mut fresh = Vec::new();
    let mut skipped_known = 0;
    for url in urls.iter().map(|u| u.trim()).filter(|u| !u.is_empty()) {
        if known.contains(url) {
            skipped_known += 1;
        } else if seen.insert(url) {
            fresh.push(url.to_string());
        }
    }

    let queued = if fresh.is_empty() {
        0
    } else {
        queue.enqueue(&fresh).await?
    };
    let submitted = urls.len();

    Ok(EnqueueOutcome {
        submitted,
        queued,
        skipped_known,
        skipped_queued: (submitted - skipped_known) as u64 - queued,
    })
}

#[derive(Default)]
struct MemoryQueueInner {
    next_seq: u64,
    entries: HashMap<String, (u64, QueueEntry)>,
}

impl MemoryQueueInner {
    fn insert(&mut self, url: &str, force_rescrape: bool) {
        let now = Utc::now();
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            url.to_string(),
            (
                seq,
                QueueEntry {
                    url: url.to_string(),
                    status: QueueStatus::Pending,
                    retry_count: 0,
                    error_message: None,
                    force_rescrape,
                    created_at: now,
                    updated_at: now,
                },
            ),
        );
    }

    fn entry_mut(&mut self, url: &str) -> Option<&mut QueueEntry> {
        self.entries.get_mut(url).map(|(_, entry)| entry)
    }

    fn transition_all(&mut self, from: QueueStatus, count_retry: bool) -> u64 {
        let now = Utc::now();
        let mut changed = 0;
        for (_, entry) in self.entries.values_mut() {
            if entry.status == from {
                entry.status = QueueStatus::Pending;
                if count_retry {
                    entry.retry_count += 1;
                }
                entry.updated_at = now;
                changed += 1;
            }
        }
        changed
    }
}

/// Queue held in process memory, with the same semantics as the PostgreSQL queue.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<MemoryQueueInner>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScrapeQueue for MemoryQueue {
    async fn enqueue(&self, urls: &[String]) -> Result<u64, QueueError> {
        let mut inner = self.inner.lock().await;
        let mut added = 0;
        for url in urls {
            if !inner.entries.contains_key(url) {
                inner.insert(url, false);
                added += 1;
            }
        }
        Ok(added)
    }

    async fn enqueue_rescrape(&self, urls: &[String]) -> Result<u64, QueueError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut affected = 0;
        for url in urls {
            match inner.entry_mut(url) {
                Some(entry) if entry.status == QueueStatus::Processing => {}
                Some(entry) => {
                    entry.status = QueueStatus::Pending;
                    entry.force_rescrape = true;
                    entry.error_message = None;
                    entry.updated_at = now;
                    affected += 1;
                }
                None => {
                    inner.insert(url, true);
                    affected += 1;
                }
            }
        }
        Ok(affected)
    }

    async fn dequeue_next(&self) -> Result<Option<QueueEntry>, QueueError> {
        let mut inner = self.inner.lock().await;
        let next = inner
            .entries
            .values()
            .filter(|(_, entry)| entry.status == QueueStatus::Pending)
            .min_by_key(|(seq, entry)| (entry.created_at, *seq))
            .map(|(_, entry)| entry.url.clone());

        Ok(next.and_then(|url| {
            inner.entry_mut(&url).map(|entry| {
                entry.status = QueueStatus::Processing;
                entry.updated_at = Utc::now();
                entry.clone()
            })
        }))
    }

    async fn mark_done(&self, url: &str) -> Result<(), QueueError> {
        if let Some(entry) = self.inner.lock().await.entry_mut(url) {
            entry.status = QueueStatus::Done;
            entry.error_message = None;
            entry.force_rescrape = false;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_failed(&self, url: &str, error_message: &str) -> Result<(), QueueError> {
        if let Some(entry) = self.inner.lock().await.entry_mut(url) {
            entry.status = QueueStatus::Failed;
            entry.error_message = Some(error_message.to_string());
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn mark_pending(&self, url: &str) -> Result<(), QueueError> {
        if let Some(entry) = self.inner.lock().await.entry_mut(url) {
            entry.status = QueueStatus::Pending;
            entry.retry_count += 1;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn reset_stuck(&self) -> Result<u64, QueueError> {
        Ok(self
            .inner
            .lock()
            .await
            .transition_all(QueueStatus::Processing, false))
    }

    async fn retry_failed(&self) -> Result<u64, QueueError> {
        Ok(self.inner.lock().await.transition_all(QueueStatus::Failed, true))
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let inner = self.inner.lock().await;
        let mut stats = QueueStats::default();
        for (_, entry) in inner.entries.values() {
            stats.add(entry.status, 1);
        }
        Ok(stats)
    }

    async fn clear(&self, status: Option<QueueStatus>) -> Result<u64, QueueError> {
        let mut inner = self.inner.lock().await;
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, (_, entry)| status.is_some_and(|s| entry.status != s));
        Ok((before - inner.entries.len()) as u64)
    }

    async fn get(&self, url: &str) -> Result<Option<QueueEntry>, QueueError> {
        Ok(self
            .inner
            .lock()
            .await
            .entries
            .get(url)
            .map(|(_, entry)| entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::perfume::{NotesPyramid, ScrapedPerfume};
    use crate::services::catalog::MemoryCatalog;
    use std::sync::Arc;
    use uuid::Uuid;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_enqueue_is_idempotent() {
        let queue = MemoryQueue::new();
        assert_eq!(queue.enqueue(&urls(&["a", "b"])).await.unwrap(), 2);
        assert_eq!(queue.enqueue(&urls(&["b", "c", "c"])).await.unwrap(), 1);
        assert_eq!(queue.stats().await.unwrap().pending, 3);
    }

    #[tokio::test]
    async fn test_claim_order_and_requeue_keeps_position() {
        let queue = MemoryQueue::new();
        queue.enqueue(&urls(&["first", "second"])).await.unwrap();

        let claimed = queue.dequeue_next().await.unwrap().unwrap();
        assert_eq!(claimed.url, "first");
        assert_eq!(claimed.status, QueueStatus::Processing);

        queue.mark_pending("first").await.unwrap();
        let again = queue.dequeue_next().await.unwrap().unwrap();
        assert_eq!(again.url, "first");
        assert_eq!(again.retry_count, 1);
    }

    #[tokio::test]
    async fn test_concurrent_claims_are_exclusive() {
        let queue = Arc::new(MemoryQueue::new());
        queue.enqueue(&urls(&["a", "b", "c"])).await.unwrap();

        let claims = futures::future::join_all((0..8).map(|_| {
            let queue = Arc::clone(&queue);
            async move { queue.dequeue_next().await.unwrap() }
        }))
        .await;

        let mut claimed: Vec<String> = claims.into_iter().flatten().map(|e| e.url).collect();
        claimed.sort();
        assert_eq!(claimed, urls(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_reset_stuck_only_touches_processing() {
        let queue = MemoryQueue::new();
        queue.enqueue(&urls(&["a", "b", "c"])).await.unwrap();
        queue.dequeue_next().await.unwrap();
        let b = queue.dequeue_next().await.unwrap().unwrap();
        queue.mark_failed(&b.url, "boom").await.unwrap();

        assert_eq!(queue.reset_stuck().await.unwrap(), 1);
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processing, 0);
    }

    #[tokio::test]
    async fn test_retry_failed_and_clear() {
        let queue = MemoryQueue::new();
        queue.enqueue(&urls(&["a", "b"])).await.unwrap();
        queue.dequeue_next().await.unwrap();
        queue.mark_failed("a", "timeout").await.unwrap();

        assert_eq!(queue.retry_failed().await.unwrap(), 1);
        let a = queue.get("a").await.unwrap().unwrap();
        assert_eq!(a.status, QueueStatus::Pending);
        assert_eq!(a.retry_count, 1);

        queue.dequeue_next().await.unwrap();
        queue.mark_done("a").await.unwrap();
        assert_eq!(queue.clear(Some(QueueStatus::Done)).await.unwrap(), 1);
        assert_eq!(queue.clear(None).await.unwrap(), 1);
        assert_eq!(queue.stats().await.unwrap().total(), 0);
    }

    #[tokio::test]
    async fn test_rescrape_resets_and_flags() {
        let queue = MemoryQueue::new();
        queue.enqueue(&urls(&["a", "b"])).await.unwrap();
        queue.dequeue_next().await.unwrap();
        queue.mark_done("a").await.unwrap();
        queue.dequeue_next().await.unwrap();

        assert_eq!(queue.enqueue_rescrape(&urls(&["a", "b", "c"])).await.unwrap(), 2);
        let a = queue.get("a").await.unwrap().unwrap();
        assert_eq!(a.status, QueueStatus::Pending);
        assert!(a.force_rescrape);
        assert_eq!(queue.get("b").await.unwrap().unwrap().status, QueueStatus::Processing);
        assert!(queue.get("c").await.unwrap().unwrap().force_rescrape);

        queue.mark_done("a").await.unwrap();
        assert!(!queue.get("a").await.unwrap().unwrap().force_rescrape);
    }

    #[tokio::test]
    async fn test_enqueue_unseen_consults_catalog() {
        let queue = MemoryQueue::new();
        let catalog = MemoryCatalog::new();
        let known = "https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html";
        catalog
            .upsert(&ScrapedPerfume {
                id: Uuid::new_v4(),
                source_url: known.to_string(),
                name: "Sauvage".to_string(),
                brand: "Dior".to_string(),
                year: None,
                perfumer: None,
                perfumer_image: None,
                gender: None,
                concentration: None,
                notes: NotesPyramid::default(),
                accords: Vec::new(),
                description: None,
                image_url: None,
                rating: None,
                longevity: None,
                sillage: None,
                season_usage: None,
                scraped_at: Utc::now(),
            })
            .await
            .unwrap();
        queue.enqueue(&urls(&["queued"])).await.unwrap();

        let outcome = enqueue_unseen(&queue, &catalog, &urls(&[known, "queued", "new", "new"]))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            EnqueueOutcome {
                submitted: 4,
                queued: 1,
                skipped_known: 1,
                skipped_queued: 2,
            }
        );
    }
}
