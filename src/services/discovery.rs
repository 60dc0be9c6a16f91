//! URL discovery from sitemaps and brand pages.
//!
//! Discovery runs in the background. Each run is a [`DiscoveryTask`] whose
//! status stays queryable in a bounded in-process registry.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use strum::Display;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::services::catalog::CatalogStore;
use crate::services::extractor::Document;
use crate::services::fetcher::{FetchError, PageFetcher};
use crate::services::queue::{enqueue_unseen, EnqueueOutcome, QueueError, ScrapeQueue};

static PERFUME_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^/]+/perfume/[^/]+/[^/?#]+-\d+\.html$").expect("valid perfume url regex")
});

static SITEMAP_LOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<loc>\s*(.*?)\s*</loc>").expect("valid sitemap loc regex"));

const MAX_SITEMAP_DEPTH: usize = 2;
const TASK_HISTORY: usize = 50;

/// Product pages look like `/perfume/<brand>/<name>-<id>.html` on any locale host.
pub fn is_perfume_url(url: &str) -> bool {
    PERFUME_URL.is_match(url)
}

/// `<loc>` values of a sitemap or sitemap index, entity-decoded.
pub fn sitemap_locations(xml: &str) -> Vec<String> {
    SITEMAP_LOC
        .captures_iter(xml)
        .filter_map(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .replace("&amp;", "&")
                .replace("&apos;", "'")
                .replace("&quot;", "\"")
                .replace("&lt;", "<")
                .replace("&gt;", ">")
        })
        .filter(|loc| !loc.is_empty())
        .collect()
}

fn is_nested_sitemap(loc: &str) -> bool {
    let path = loc.split(['?', '#']).next().unwrap_or(loc).to_lowercase();
    path.ends_with(".xml") || path.ends_with(".xml.gz")
}

/// Absolute, de-duplicated product links found on a listing page.
pub fn perfume_links(html: &str, page_url: &str) -> Vec<String> {
    let doc = Document::parse(html, page_url);
    let mut seen = HashSet::new();
    doc.select("a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| doc.absolutize(href))
        .filter_map(|href| {
            let mut parsed = Url::parse(&href).ok()?;
            parsed.set_query(None);
            parsed.set_fragment(None);
            Some(parsed.to_string())
        })
        .filter(|url| is_perfume_url(url))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Walks sitemap indexes down to product URLs.
pub struct SitemapClient {
    http: reqwest::Client,
    max_depth: usize,
}

impl SitemapClient {
    pub fn new(timeout: Duration) -> Result<Self, DiscoveryError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("perfume-catalog/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            max_depth: MAX_SITEMAP_DEPTH,
        })
    }

    pub async fn discover(&self, sitemap_url: &str) -> Result<Vec<String>, DiscoveryError> {
        let mut pending = VecDeque::from([(sitemap_url.to_string(), 0usize)]);
        let mut visited = HashSet::new();
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        while let Some((url, depth)) = pending.pop_front() {
            if !visited.insert(url.clone()) {
                continue;
            }
            let xml = match self.fetch(&url).await {
                Ok(xml) => xml,
                Err(e) if depth > 0 => {
                    warn!(url = %url, error = %e, "Skipping unreadable sitemap");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for loc in sitemap_locations(&xml) {
                if is_nested_sitemap(&loc) {
                    if depth < self.max_depth {
                        pending.push_back((loc, depth + 1));
                    }
                } else if is_perfume_url(&loc) && seen.insert(loc.clone()) {
                    found.push(loc);
                }
            }
            debug!(url = %url, depth, found = found.len(), "Sitemap read");
        }

        Ok(found)
    }

    async fn fetch(&self, url: &str) -> Result<String, DiscoveryError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DiscoveryKind {
    Sitemap,
    Brand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DiscoveryTask {
    pub id: Uuid,
    pub kind: DiscoveryKind,
    pub source: String,
    pub status: TaskStatus,
    pub found: usize,
    pub outcome: Option<EnqueueOutcome>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
struct Registry {
    tasks: HashMap<Uuid, DiscoveryTask>,
    order: VecDeque<Uuid>,
}

/// Most recent discovery tasks; the oldest finished ones are dropped first.
pub struct DiscoveryTasks {
    inner: RwLock<Registry>,
    capacity: usize,
}

impl DiscoveryTasks {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Registry::default()),
            capacity,
        }
    }

    async fn register(&self, kind: DiscoveryKind, source: &str) -> Uuid {
        let id = Uuid::new_v4();
        let mut inner = self.inner.write().await;

        while inner.order.len() >= self.capacity {
            let evict = inner.order.iter().position(|old| {
                inner
                    .tasks
                    .get(old)
                    .map_or(true, |t| t.status != TaskStatus::Running)
            });
            let Some(index) = evict else { break };
            if let Some(old) = inner.order.remove(index) {
                inner.tasks.remove(&old);
            }
        }

        inner.order.push_back(id);
        inner.tasks.insert(
            id,
            DiscoveryTask {
                id,
                kind,
                source: source.to_string(),
                status: TaskStatus::Running,
                found: 0,
                outcome: None,
                error: None,
                started_at: Utc::now(),
                finished_at: None,
            },
        );
        id
    }

    async fn finish(&self, id: Uuid, result: Result<(usize, EnqueueOutcome), DiscoveryError>) {
        let mut inner = self.inner.write().await;
        let Some(task) = inner.tasks.get_mut(&id) else {
            return;
        };
        task.finished_at = Some(Utc::now());
        match result {
            Ok((found, outcome)) => {
                task.status = TaskStatus::Completed;
                task.found = found;
                task.outcome = Some(outcome);
            }
            Err(e) => {
                task.status = TaskStatus::Failed;
                task.error = Some(e.to_string());
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Option<DiscoveryTask> {
        self.inner.read().await.tasks.get(&id).cloned()
    }

    pub async fn list(&self) -> Vec<DiscoveryTask> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.tasks.get(id).cloned())
            .collect()
    }
}

/// Finds product URLs and feeds them to the queue through the seen-universe check.
pub struct Discovery {
    fetcher: Arc<dyn PageFetcher>,
    sitemaps: SitemapClient,
    queue: Arc<dyn ScrapeQueue>,
    catalog: Arc<dyn CatalogStore>,
    tasks: DiscoveryTasks,
}

impl Discovery {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        sitemaps: SitemapClient,
        queue: Arc<dyn ScrapeQueue>,
        catalog: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            fetcher,
            sitemaps,
            queue,
            catalog,
            tasks: DiscoveryTasks::new(TASK_HISTORY),
        }
    }

    pub fn tasks(&self) -> &DiscoveryTasks {
        &self.tasks
    }

    /// Start a background discovery run and return its task id.
    pub async fn spawn(self: &Arc<Self>, kind: DiscoveryKind, source: String) -> Uuid {
        let id = self.tasks.register(kind, &source).await;
        let discovery = Arc::clone(self);

        tokio::spawn(async move {
            info!(task_id = %id, kind = %kind, source = %source, "Discovery started");
            let result = discovery.run(kind, &source).await;
            match &result {
                Ok((found, outcome)) => info!(
                    task_id = %id,
                    found,
                    queued = outcome.queued,
                    skipped_known = outcome.skipped_known,
                    skipped_queued = outcome.skipped_queued,
                    "Discovery completed"
                ),
                Err(e) => warn!(task_id = %id, error = %e, "Discovery failed"),
            }
            discovery.tasks.finish(id, result).await;
        });

        id
    }

    async fn run(
        &self,
        kind: DiscoveryKind,
        source: &str,
    ) -> Result<(usize, EnqueueOutcome), DiscoveryError> {
        let urls = match kind {
            DiscoveryKind::Sitemap => self.sitemaps.discover(source).await?,
            DiscoveryKind::Brand => self.brand_page(source).await?,
        };
        let outcome = enqueue_unseen(self.queue.as_ref(), self.catalog.as_ref(), &urls).await?;
        Ok((urls.len(), outcome))
    }

    async fn brand_page(&self, url: &str) -> Result<Vec<String>, DiscoveryError> {
        let page = self.fetcher.fetch(url).await?;
        Ok(perfume_links(&page.html, url))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfume_url_shape() {
        assert!(is_perfume_url("https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html"));
        assert!(is_perfume_url("https://www.fragrantica.es/perfume/Chanel/No-5-40069.html"));
        assert!(!is_perfume_url("https://www.fragrantica.com/designers/Dior.html"));
        assert!(!is_perfume_url("https://www.fragrantica.com/perfume/Dior/"));
    }

    #[test]
    fn test_sitemap_locations() {
        let xml = r#"<?xml version="1.0"?>
            <sitemapindex>
              <sitemap><loc>https://www.fragrantica.com/sitemap_perfumes_1.xml</loc></sitemap>
              <sitemap><loc>
                https://www.fragrantica.com/sitemap.xml?page=2&amp;lang=en
              </loc></sitemap>
            </sitemapindex>"#;
        let locs = sitemap_locations(xml);
        assert_eq!(
            locs,
            vec![
                "https://www.fragrantica.com/sitemap_perfumes_1.xml",
                "https://www.fragrantica.com/sitemap.xml?page=2&lang=en",
            ]
        );
        assert!(locs.iter().all(|l| is_nested_sitemap(l)));
    }

    #[test]
    fn test_perfume_links_on_brand_page() {
        let html = r#"<html><body>
            <a href="/perfume/Dior/Sauvage-31861.html">Sauvage</a>
            <a href="/perfume/Dior/Sauvage-31861.html#reviews">Reviews</a>
            <a href="//www.fragrantica.com/perfume/Dior/Fahrenheit-228.html?ref=x">Fahrenheit</a>
            <a href="/news/some-article.html">News</a>
        </body></html>"#;
        assert_eq!(
            perfume_links(html, "https://www.fragrantica.com/designers/Dior.html"),
            vec![
                "https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html",
                "https://www.fragrantica.com/perfume/Dior/Fahrenheit-228.html",
            ]
        );
    }

    #[tokio::test]
    async fn test_registry_evicts_oldest_finished() {
        let tasks = DiscoveryTasks::new(2);
        let first = tasks.register(DiscoveryKind::Sitemap, "a").await;
        tasks.finish(first, Ok((0, EnqueueOutcome::default()))).await;
        let second = tasks.register(DiscoveryKind::Brand, "b").await;
        let third = tasks.register(DiscoveryKind::Brand, "c").await;

        assert!(tasks.get(first).await.is_none());
        assert_eq!(tasks.get(second).await.unwrap().status, TaskStatus::Running);
        assert_eq!(tasks.list().await.len(), 2);
        assert_eq!(tasks.list().await[1].id, third);
    }
}
