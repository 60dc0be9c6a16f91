use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::models::perfume::ScrapedPerfume;

struct CacheEntry {
    record: ScrapedPerfume,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Hits over lookups, 0.0 before the first lookup.
    pub hit_rate: f64,
    pub ttl_secs: u64,
}

/// In-process memo of scrape results keyed by URL. Expired entries are
/// evicted when they are next read.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            ttl,
        }
    }

    pub async fn get(&self, url: &str) -> Option<ScrapedPerfume> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;

        let expired = inner.entries.get(url).map(|entry| entry.expires_at <= now);
        let live = match expired {
            Some(false) => inner.entries.get(url).map(|entry| entry.record.clone()),
            Some(true) => {
                inner.entries.remove(url);
                tracing::debug!(url, "Evicted expired cache entry");
                None
            }
            None => None,
        };

        if live.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        live
    }

    pub async fn set(&self, url: &str, record: ScrapedPerfume) {
        self.set_with_ttl(url, record, self.ttl).await;
    }

    pub async fn set_with_ttl(&self, url: &str, record: ScrapedPerfume, ttl: Duration) {
        let expires_at = chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.inner
            .lock()
            .await
            .entries
            .insert(url.to_string(), CacheEntry { record, expires_at });
    }

    /// Forget one URL; true if it was cached.
    pub async fn invalidate(&self, url: &str) -> bool {
        self.inner.lock().await.entries.remove(url).is_some()
    }

    /// Drop every entry and reset counters; returns how many entries were held.
    pub async fn flush(&self) -> usize {
        let mut inner = self.inner.lock().await;
        let count = inner.entries.len();
        *inner = CacheInner::default();
        count
    }

    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().await;
        let lookups = inner.hits + inner.misses;
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
