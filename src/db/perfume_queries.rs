use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{postgres::PgRow, types::Json, PgPool, Row};
use uuid::Uuid;

use crate::models::perfume::{
    Gender, NotesPyramid, PerformanceMetric, PerfumePatch, PerfumeRecord, ScrapedPerfume,
    SeasonUsage,
};
use crate::services::catalog::{CatalogError, CatalogStore};

const PERFUME_COLUMNS: &str = r#"
    id, source_url, name, brand, year, perfumer, perfumer_image, gender, concentration,
    notes, accords, description, image_url, rating, longevity, sillage, season_usage,
    scraped_at, created_at, updated_at
"#;

pub async fn all_source_urls(pool: &PgPool) -> Result<HashSet<String>, sqlx::Error> {
    let rows = sqlx::query("SELECT source_url FROM perfumes")
        .fetch_all(pool)
        .await?;

    rows.iter().map(|r| r.try_get("source_url")).collect()
}

pub async fn exists_by_source_url(pool: &PgPool, url: &str) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM perfumes WHERE source_url = $1) AS found")
        .bind(url)
        .fetch_one(pool)
        .await?;

    row.try_get("found")
}

/// Insert or merge on `source_url`. Absent scalars keep the stored value,
/// notes and accords are replaced, the row id never changes.
pub async fn upsert_perfume(
    pool: &PgPool,
    perfume: &ScrapedPerfume,
) -> Result<PerfumeRecord, CatalogError> {
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO perfumes (
            id, source_url, name, brand, year, perfumer, perfumer_image, gender,
            concentration, notes, accords, description, image_url, rating,
            longevity, sillage, season_usage, scraped_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, COALESCE($8::text, 'unisex'),
                $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        ON CONFLICT (source_url) DO UPDATE SET
            name = EXCLUDED.name,
            brand = EXCLUDED.brand,
            year = COALESCE(EXCLUDED.year, perfumes.year),
            perfumer = COALESCE(EXCLUDED.perfumer, perfumes.perfumer),
            perfumer_image = COALESCE(EXCLUDED.perfumer_image, perfumes.perfumer_image),
            gender = COALESCE($8::text, perfumes.gender),
            concentration = COALESCE(EXCLUDED.concentration, perfumes.concentration),
            notes = EXCLUDED.notes,
            accords = EXCLUDED.accords,
            description = COALESCE(EXCLUDED.description, perfumes.description),
            image_url = COALESCE(EXCLUDED.image_url, perfumes.image_url),
            rating = COALESCE(EXCLUDED.rating, perfumes.rating),
            longevity = COALESCE(EXCLUDED.longevity, perfumes.longevity),
            sillage = COALESCE(EXCLUDED.sillage, perfumes.sillage),
            season_usage = COALESCE(EXCLUDED.season_usage, perfumes.season_usage),
            scraped_at = EXCLUDED.scraped_at,
            updated_at = NOW()
        RETURNING {PERFUME_COLUMNS}
        "#
    ))
    .bind(perfume.id)
    .bind(&perfume.source_url)
    .bind(&perfume.name)
    .bind(&perfume.brand)
    .bind(perfume.year)
    .bind(&perfume.perfumer)
    .bind(&perfume.perfumer_image)
    .bind(perfume.gender.map(|g| g.to_string()))
    .bind(&perfume.concentration)
    .bind(Json(&perfume.notes))
    .bind(Json(&perfume.accords))
    .bind(&perfume.description)
    .bind(&perfume.image_url)
    .bind(perfume.rating)
    .bind(perfume.longevity.as_ref().map(Json))
    .bind(perfume.sillage.as_ref().map(Json))
    .bind(perfume.season_usage.map(Json))
    .bind(perfume.scraped_at)
    .fetch_one(pool)
    .await?;

    record_from_row(&row)
}

/// Rows lacking notes, accords, longevity or sillage.
pub async fn get_incomplete(pool: &PgPool, limit: i64) -> Result<Vec<PerfumeRecord>, CatalogError> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {PERFUME_COLUMNS}
        FROM perfumes
        WHERE COALESCE(jsonb_array_length(notes->'top'), 0)
              + COALESCE(jsonb_array_length(notes->'heart'), 0)
              + COALESCE(jsonb_array_length(notes->'base'), 0) = 0
           OR jsonb_array_length(accords) = 0
           OR longevity IS NULL
           OR sillage IS NULL
        ORDER BY scraped_at NULLS FIRST, created_at
        LIMIT $1
        "#
    ))
    .bind(limit.max(0))
    .fetch_all(pool)
    .await?;

    rows.iter().map(record_from_row).collect()
}

pub async fn get_perfume(pool: &PgPool, id: Uuid) -> Result<Option<PerfumeRecord>, CatalogError> {
    let row = sqlx::query(&format!("SELECT {PERFUME_COLUMNS} FROM perfumes WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(record_from_row).transpose()
}

/// Partial update; `NULL` parameters keep the stored column.
pub async fn update_perfume(
    pool: &PgPool,
    id: Uuid,
    patch: &PerfumePatch,
) -> Result<Option<PerfumeRecord>, CatalogError> {
    let row = sqlx::query(&format!(
        r#"
        UPDATE perfumes SET
            name = COALESCE($2, name),
            brand = COALESCE($3, brand),
            year = COALESCE($4, year),
            perfumer = COALESCE($5, perfumer),
            gender = COALESCE($6, gender),
            concentration = COALESCE($7, concentration),
            notes = COALESCE($8, notes),
            accords = COALESCE($9, accords),
            description = COALESCE($10, description),
            image_url = COALESCE($11, image_url),
            rating = COALESCE($12, rating),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {PERFUME_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&patch.name)
    .bind(&patch.brand)
    .bind(patch.year)
    .bind(&patch.perfumer)
    .bind(patch.gender.map(|g| g.to_string()))
    .bind(&patch.concentration)
    .bind(patch.notes.as_ref().map(Json))
    .bind(patch.accords.as_ref().map(Json))
    .bind(&patch.description)
    .bind(&patch.image_url)
    .bind(patch.rating)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(record_from_row).transpose()
}

fn record_from_row(row: &PgRow) -> Result<PerfumeRecord, CatalogError> {
    let gender: String = row.try_get("gender")?;
    let gender = gender
        .parse::<Gender>()
        .map_err(|_| CatalogError::InvalidValue(format!("gender {}", gender)))?;
    let notes: Json<NotesPyramid> = row.try_get("notes")?;
    let accords: Json<Vec<String>> = row.try_get("accords")?;
    let longevity: Option<Json<PerformanceMetric>> = row.try_get("longevity")?;
    let sillage: Option<Json<PerformanceMetric>> = row.try_get("sillage")?;
    let season_usage: Option<Json<SeasonUsage>> = row.try_get("season_usage")?;

    Ok(PerfumeRecord {
        id: row.try_get("id")?,
        source_url: row.try_get("source_url")?,
        name: row.try_get("name")?,
        brand: row.try_get("brand")?,
        year: row.try_get("year")?,
        perfumer: row.try_get("perfumer")?,
        perfumer_image: row.try_get("perfumer_image")?,
        gender,
        concentration: row.try_get("concentration")?,
        notes: notes.0,
        accords: accords.0,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        rating: row.try_get("rating")?,
        longevity: longevity.map(|j| j.0),
        sillage: sillage.map(|j| j.0),
        season_usage: season_usage.map(|j| j.0),
        scraped_at: row.try_get("scraped_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// PostgreSQL-backed perfume catalog.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalog {
    async fn all_source_urls(&self) -> Result<HashSet<String>, CatalogError> {
        Ok(all_source_urls(&self.pool).await?)
    }

    async fn exists_by_source_url(&self, url: &str) -> Result<bool, CatalogError> {
        Ok(exists_by_source_url(&self.pool, url).await?)
    }

    async fn upsert(&self, perfume: &ScrapedPerfume) -> Result<PerfumeRecord, CatalogError> {
        upsert_perfume(&self.pool, perfume).await
    }

    async fn get_incomplete(&self, limit: i64) -> Result<Vec<PerfumeRecord>, CatalogError> {
        get_incomplete(&self.pool, limit).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<PerfumeRecord>, CatalogError> {
        get_perfume(&self.pool, id).await
    }

    async fn update(
        &self,
        id: Uuid,
        patch: &PerfumePatch,
    ) -> Result<Option<PerfumeRecord>, CatalogError> {
        update_perfume(&self.pool, id, patch).await
    }
}
