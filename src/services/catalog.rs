use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::perfume::{PerfumePatch, PerfumeRecord, ScrapedPerfume};

/// Durable perfume catalog keyed by source URL.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn all_source_urls(&self) -> Result<HashSet<String>, CatalogError>;

    async fn exists_by_source_url(&self, url: &str) -> Result<bool, CatalogError>;

    /// Insert, or merge into the row with the same source URL. Incoming
    /// values overwrite, absent values keep what is stored, notes and accords
    /// are replaced. The stored row keeps its original id.
    async fn upsert(&self, perfume: &ScrapedPerfume) -> Result<PerfumeRecord, CatalogError>;

    /// Rows missing notes, accords, longevity or sillage, oldest scrape first.
    async fn get_incomplete(&self, limit: i64) -> Result<Vec<PerfumeRecord>, CatalogError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<PerfumeRecord>, CatalogError>;

    async fn update(
        &self,
        id: Uuid,
        patch: &PerfumePatch,
    ) -> Result<Option<PerfumeRecord>, CatalogError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),
}

/// Catalog held in process memory with the same merge rules as PostgreSQL.
#[derive(Default)]
pub struct MemoryCatalog {
    rows: RwLock<HashMap<String, PerfumeRecord>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn get_by_source_url(&self, url: &str) -> Option<PerfumeRecord> {
        self.rows.read().await.get(url).cloned()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalog {
    async fn all_source_urls(&self) -> Result<HashSet<String>, CatalogError> {
        Ok(self.rows.read().await.keys().cloned().collect())
    }

    async fn exists_by_source_url(&self, url: &str) -> Result<bool, CatalogError> {
        Ok(self.rows.read().await.contains_key(url))
    }

    async fn upsert(&self, perfume: &ScrapedPerfume) -> Result<PerfumeRecord, CatalogError> {
        let now = Utc::now();
        let mut rows = self.rows.write().await;
        let record = rows
            .entry(perfume.source_url.clone())
            .and_modify(|stored| stored.merge_scraped(perfume, now))
            .or_insert_with(|| PerfumeRecord::from_scraped(perfume, now));
        Ok(record.clone())
    }

    async fn get_incomplete(&self, limit: i64) -> Result<Vec<PerfumeRecord>, CatalogError> {
        let rows = self.rows.read().await;
        let mut incomplete: Vec<PerfumeRecord> = rows
            .values()
            .filter(|r| r.is_incomplete())
            .cloned()
            .collect();
        incomplete.sort_by_key(|r| (r.scraped_at, r.created_at));
        incomplete.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(incomplete)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<PerfumeRecord>, CatalogError> {
        Ok(self.rows.read().await.values().find(|r| r.id == id).cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &PerfumePatch,
    ) -> Result<Option<PerfumeRecord>, CatalogError> {
        let mut rows = self.rows.write().await;
        Ok(rows.values_mut().find(|r| r.id == id).map(|record| {
            record.apply_patch(patch, Utc::now());
            record.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::perfume::{Gender, NotesPyramid, PerformanceMetric};

    fn scraped(url: &str, name: &str, year: Option<i32>) -> ScrapedPerfume {
        ScrapedPerfume {
            id: Uuid::new_v4(),
            source_url: url.to_string(),
            name: name.to_string(),
            brand: "Guerlain".to_string(),
            year,
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
        }
    }

    const URL: &str = "https://www.fragrantica.com/perfume/Guerlain/Shalimar-101.html";

    #[tokio::test]
    async fn test_upsert_merges_on_source_url() {
        let catalog = MemoryCatalog::new();
        let first = catalog.upsert(&scraped(URL, "Y", Some(1995))).await.unwrap();
        let second = catalog.upsert(&scraped(URL, "X", None)).await.unwrap();

        assert_eq!(catalog.len().await, 1);
        assert_eq!(second.id, first.id);
        assert_eq!(second.name, "X");
        assert_eq!(second.year, Some(1995));
        assert_eq!(second.gender, Gender::Unisex);
    }

    #[tokio::test]
    async fn test_incomplete_and_patch() {
        let catalog = MemoryCatalog::new();
        let mut complete = scraped("https://www.fragrantica.com/perfume/A/B-1.html", "B", None);
        complete.notes.heart = vec!["Rose".to_string()];
        complete.accords = vec!["floral".to_string()];
        let metric = PerformanceMetric {
            dominant: "moderate".to_string(),
            percentage: 100,
            votes: [("moderate".to_string(), 3)].into_iter().collect(),
        };
        complete.longevity = Some(metric.clone());
        complete.sillage = Some(metric);
        catalog.upsert(&complete).await.unwrap();
        let partial = catalog.upsert(&scraped(URL, "Shalimar", None)).await.unwrap();

        let incomplete = catalog.get_incomplete(10).await.unwrap();
        assert_eq!(incomplete.len(), 1);
        assert_eq!(incomplete[0].source_url, URL);

        let patch = PerfumePatch {
            year: Some(1925),
            gender: Some(Gender::Feminine),
            ..Default::default()
        };
        let updated = catalog.update(partial.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.year, Some(1925));
        assert_eq!(updated.gender, Gender::Feminine);
        assert_eq!(updated.name, "Shalimar");

        assert!(catalog.update(Uuid::new_v4(), &patch).await.unwrap().is_none());
        assert!(catalog.exists_by_source_url(URL).await.unwrap());
        assert_eq!(catalog.all_source_urls().await.unwrap().len(), 2);
    }
}
