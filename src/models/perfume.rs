use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Target gender of a fragrance as advertised by the source page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Gender {
    Masculine,
    Feminine,
    #[default]
    Unisex,
}

/// Closed vocabulary of concentrations, ordered from most to least specific match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq)]
pub enum Concentration {
    #[strum(serialize = "Extrait de Parfum")]
    #[serde(rename = "Extrait de Parfum")]
    Extrait,
    #[strum(serialize = "Eau de Parfum")]
    #[serde(rename = "Eau de Parfum")]
    EauDeParfum,
    #[strum(serialize = "Eau de Toilette")]
    #[serde(rename = "Eau de Toilette")]
    EauDeToilette,
    #[strum(serialize = "Eau de Cologne")]
    #[serde(rename = "Eau de Cologne")]
    EauDeCologne,
    #[strum(serialize = "Eau Fraiche")]
    #[serde(rename = "Eau Fraiche")]
    EauFraiche,
    #[strum(serialize = "Parfum")]
    #[serde(rename = "Parfum")]
    Parfum,
}

/// Top/heart/base notes pyramid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotesPyramid {
    pub top: Vec<String>,
    pub heart: Vec<String>,
    pub base: Vec<String>,
}

impl NotesPyramid {
    pub fn is_empty(&self) -> bool {
        self.top.is_empty() && self.heart.is_empty() && self.base.is_empty()
    }
}

/// Aggregated community votes for longevity or sillage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceMetric {
    /// Category with the highest vote count.
    pub dominant: String,
    /// Share of the dominant category in all votes, 0-100.
    pub percentage: i32,
    pub votes: BTreeMap<String, u64>,
}

/// Seasonal and time-of-day suitability, each bucket scaled 0-100 against the
/// most voted bucket.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonUsage {
    pub winter: i32,
    pub spring: i32,
    pub summer: i32,
    pub autumn: i32,
    pub day: i32,
    pub night: i32,
}

/// Everything the extractor can read off a product page. Every field but the
/// required pair degrades to `None`/empty independently.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExtractedPerfume {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub year: Option<i32>,
    pub perfumer: Option<String>,
    pub perfumer_image: Option<String>,
    pub gender: Option<Gender>,
    pub concentration: Option<Concentration>,
    pub notes: NotesPyramid,
    pub accords: Vec<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub longevity: Option<PerformanceMetric>,
    pub sillage: Option<PerformanceMetric>,
    pub season_usage: Option<SeasonUsage>,
}

/// A validated scrape result, ready to be upserted into the catalog.
///
/// `gender` stays optional here so that an undetermined value on re-scrape
/// does not overwrite a previously stored one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedPerfume {
    pub id: Uuid,
    pub source_url: String,
    pub name: String,
    pub brand: String,
    pub year: Option<i32>,
    pub perfumer: Option<String>,
    pub perfumer_image: Option<String>,
    pub gender: Option<Gender>,
    pub concentration: Option<String>,
    pub notes: NotesPyramid,
    pub accords: Vec<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub longevity: Option<PerformanceMetric>,
    pub sillage: Option<PerformanceMetric>,
    pub season_usage: Option<SeasonUsage>,
    pub scraped_at: DateTime<Utc>,
}

/// A perfume as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerfumeRecord {
    pub id: Uuid,
    pub source_url: String,
    pub name: String,
    pub brand: String,
    pub year: Option<i32>,
    pub perfumer: Option<String>,
    pub perfumer_image: Option<String>,
    pub gender: Gender,
    pub concentration: Option<String>,
    pub notes: NotesPyramid,
    pub accords: Vec<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub longevity: Option<PerformanceMetric>,
    pub sillage: Option<PerformanceMetric>,
    pub season_usage: Option<SeasonUsage>,
    pub scraped_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PerfumeRecord {
    /// Build a fresh catalog row from a scrape result.
    pub fn from_scraped(scraped: &ScrapedPerfume, now: DateTime<Utc>) -> Self {
        Self {
            id: scraped.id,
            source_url: scraped.source_url.clone(),
            name: scraped.name.clone(),
            brand: scraped.brand.clone(),
            year: scraped.year,
            perfumer: scraped.perfumer.clone(),
            perfumer_image: scraped.perfumer_image.clone(),
            gender: scraped.gender.unwrap_or_default(),
            concentration: scraped.concentration.clone(),
            notes: scraped.notes.clone(),
            accords: scraped.accords.clone(),
            description: scraped.description.clone(),
            image_url: scraped.image_url.clone(),
            rating: scraped.rating,
            longevity: scraped.longevity.clone(),
            sillage: scraped.sillage.clone(),
            season_usage: scraped.season_usage,
            scraped_at: Some(scraped.scraped_at),
            created_at: now,
            updated_at: now,
        }
    }

    /// Coalesce-style merge of a re-scrape into an existing row: incoming
    /// values overwrite, missing values keep what is stored. Notes and accords
    /// are replaced wholesale.
    pub fn merge_scraped(&mut self, incoming: &ScrapedPerfume, now: DateTime<Utc>) {
        self.name = incoming.name.clone();
        self.brand = incoming.brand.clone();
        coalesce(&mut self.year, &incoming.year);
        coalesce(&mut self.perfumer, &incoming.perfumer);
        coalesce(&mut self.perfumer_image, &incoming.perfumer_image);
        if let Some(gender) = incoming.gender {
            self.gender = gender;
        }
        coalesce(&mut self.concentration, &incoming.concentration);
        self.notes = incoming.notes.clone();
        self.accords = incoming.accords.clone();
        coalesce(&mut self.description, &incoming.description);
        coalesce(&mut self.image_url, &incoming.image_url);
        coalesce(&mut self.rating, &incoming.rating);
        coalesce(&mut self.longevity, &incoming.longevity);
        coalesce(&mut self.sillage, &incoming.sillage);
        coalesce(&mut self.season_usage, &incoming.season_usage);
        self.scraped_at = Some(incoming.scraped_at);
        self.updated_at = now;
    }

    /// Apply an administrative partial update with the same coalesce rule.
    pub fn apply_patch(&mut self, patch: &PerfumePatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(brand) = &patch.brand {
            self.brand = brand.clone();
        }
        coalesce(&mut self.year, &patch.year);
        coalesce(&mut self.perfumer, &patch.perfumer);
        if let Some(gender) = patch.gender {
            self.gender = gender;
        }
        coalesce(&mut self.concentration, &patch.concentration);
        if let Some(notes) = &patch.notes {
            self.notes = notes.clone();
        }
        if let Some(accords) = &patch.accords {
            self.accords = accords.clone();
        }
        coalesce(&mut self.description, &patch.description);
        coalesce(&mut self.image_url, &patch.image_url);
        coalesce(&mut self.rating, &patch.rating);
        self.updated_at = now;
    }

    /// Missing any of the harvested structures worth a re-scrape.
    pub fn is_incomplete(&self) -> bool {
        self.notes.is_empty()
            || self.accords.is_empty()
            || self.longevity.is_none()
            || self.sillage.is_none()
    }
}

fn coalesce<T: Clone>(stored: &mut Option<T>, incoming: &Option<T>) {
    if let Some(value) = incoming {
        *stored = Some(value.clone());
    }
}

/// Partial update of a catalog entry; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, garde::Validate)]
pub struct PerfumePatch {
    #[garde(length(min = 1, max = 300))]
    pub name: Option<String>,
    #[garde(length(min = 1, max = 200))]
    pub brand: Option<String>,
    #[garde(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    #[garde(skip)]
    pub perfumer: Option<String>,
    #[garde(skip)]
    pub gender: Option<Gender>,
    #[garde(skip)]
    pub concentration: Option<String>,
    #[garde(skip)]
    pub notes: Option<NotesPyramid>,
    #[garde(skip)]
    pub accords: Option<Vec<String>>,
    #[garde(skip)]
    pub description: Option<String>,
    #[garde(skip)]
    pub image_url: Option<String>,
    #[garde(range(min = 0.0, max = 5.0))]
    pub rating: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraped(name: &str, year: Option<i32>) -> ScrapedPerfume {
        ScrapedPerfume {
            id: Uuid::new_v4(),
            source_url: "https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html".to_string(),
            name: name.to_string(),
            brand: "Dior".to_string(),
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

    #[test]
    fn test_merge_keeps_stored_value_when_incoming_is_missing() {
        let mut stored = PerfumeRecord::from_scraped(&scraped("Y", Some(1995)), Utc::now());
        stored.gender = Gender::Masculine;
        let original_id = stored.id;

        stored.merge_scraped(&scraped("X", None), Utc::now());

        assert_eq!(stored.name, "X");
        assert_eq!(stored.year, Some(1995));
        assert_eq!(stored.gender, Gender::Masculine);
        assert_eq!(stored.id, original_id);
    }

    #[test]
    fn test_merge_replaces_notes_and_accords() {
        let mut first = scraped("Sauvage", None);
        first.accords = vec!["fresh spicy".to_string(), "amber".to_string()];
        first.notes.top = vec!["Bergamot".to_string()];
        let mut stored = PerfumeRecord::from_scraped(&first, Utc::now());

        let second = scraped("Sauvage", None);
        stored.merge_scraped(&second, Utc::now());

        assert!(stored.accords.is_empty());
        assert!(stored.notes.is_empty());
    }

    #[test]
    fn test_new_record_defaults_to_unisex() {
        let record = PerfumeRecord::from_scraped(&scraped("Sauvage", None), Utc::now());
        assert_eq!(record.gender, Gender::Unisex);
        assert!(record.is_incomplete());
    }

    #[test]
    fn test_concentration_display() {
        assert_eq!(Concentration::EauDeParfum.to_string(), "Eau de Parfum");
        assert_eq!(Gender::Feminine.to_string(), "feminine");
        assert_eq!("unisex".parse::<Gender>().unwrap(), Gender::Unisex);
    }
}
