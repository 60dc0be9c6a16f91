//! Community vote widgets: longevity, sillage and season/time-of-day usage.
//!
//! Scores are always derived from vote counts found on the page. When no
//! counts are found the field stays `None` rather than defaulting to zero.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use super::{cascade, element_text, Document, Strategy};
use crate::models::perfume::{PerformanceMetric, SeasonUsage};

static VOTE_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+(?:[.,]\d+)*)(\s*[kK]\b)?").expect("valid vote count regex")
});

static SEASON_COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(winter|spring|summer|autumn|fall|day|night|invierno|primavera|verano|otoño|día|noche)\s*:\s*(\d+(?:[.,]\d+)*\s*[kK]?)",
    )
    .expect("valid season regex")
});

const MAX_ROW_LEN: usize = 60;
const MAX_KEYWORD_LEN: usize = 40;
const ANCESTOR_SCAN: usize = 4;

/// A vote widget: the words that introduce it and its category labels,
/// longest label first so "very weak" is not read as "weak".
struct MetricSpec {
    field: &'static str,
    keywords: &'static [&'static str],
    categories: &'static [(&'static str, &'static str)],
}

const LONGEVITY: MetricSpec = MetricSpec {
    field: "longevity",
    keywords: &["longevity", "longevidad", "duración", "duracion"],
    categories: &[
        ("very weak", "very_weak"),
        ("muy débil", "very_weak"),
        ("muy debil", "very_weak"),
        ("long lasting", "long_lasting"),
        ("muy duradera", "eternal"),
        ("duradera", "long_lasting"),
        ("moderate", "moderate"),
        ("moderada", "moderate"),
        ("eternal", "eternal"),
        ("eterna", "eternal"),
        ("débil", "weak"),
        ("debil", "weak"),
        ("weak", "weak"),
    ],
};

const SILLAGE: MetricSpec = MetricSpec {
    field: "sillage",
    keywords: &["sillage", "estela"],
    categories: &[
        ("intimate", "intimate"),
        ("íntima", "intimate"),
        ("intima", "intimate"),
        ("suave", "intimate"),
        ("moderate", "moderate"),
        ("moderada", "moderate"),
        ("strong", "strong"),
        ("fuerte", "strong"),
        ("enormous", "enormous"),
        ("enorme", "enormous"),
    ],
};

/// Season and time-of-day buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
    Day,
    Night,
}

const SEASON_LABELS: [(&str, Season); 13] = [
    ("winter", Season::Winter),
    ("invierno", Season::Winter),
    ("spring", Season::Spring),
    ("primavera", Season::Spring),
    ("summer", Season::Summer),
    ("verano", Season::Summer),
    ("autumn", Season::Autumn),
    ("fall", Season::Autumn),
    ("otoño", Season::Autumn),
    ("day", Season::Day),
    ("día", Season::Day),
    ("night", Season::Night),
    ("noche", Season::Night),
];

const SEASON_STRATEGIES: [Strategy<HashMap<Season, u64>>; 3] = [
    Strategy { name: "vote_rows", run: season_vote_rows },
    Strategy { name: "adjacent_text", run: season_adjacent_text },
    Strategy { name: "labelled_text", run: season_labelled_text },
];

pub(super) fn longevity(doc: &Document) -> Option<PerformanceMetric> {
    performance(doc, &LONGEVITY)
}

pub(super) fn sillage(doc: &Document) -> Option<PerformanceMetric> {
    performance(doc, &SILLAGE)
}

pub(super) fn season_usage(doc: &Document) -> Option<SeasonUsage> {
    cascade("season_usage", doc, &SEASON_STRATEGIES).and_then(|votes| normalize_season_votes(&votes))
}

/// Parse a vote count such as `"120"`, `"1,204"` or `"1.2k"`.
pub fn parse_vote_count(text: &str) -> Option<u64> {
    let caps = VOTE_COUNT.captures_iter(text).last()?;
    let digits = caps.get(1)?.as_str();
    if caps.get(2).is_some() {
        let value = digits.replace(',', ".").parse::<f64>().ok()?;
        Some((value * 1000.0).round() as u64)
    } else {
        digits.replace([',', '.'], "").parse::<u64>().ok()
    }
}

/// Scale every bucket 0-100 against the most voted one; `None` without any votes.
pub fn normalize_season_votes(votes: &HashMap<Season, u64>) -> Option<SeasonUsage> {
    let max = votes.values().copied().max().unwrap_or(0);
    if max == 0 {
        return None;
    }
    let scaled = |season: Season| -> i32 {
        let raw = votes.get(&season).copied().unwrap_or(0);
        (raw as f64 * 100.0 / max as f64).round() as i32
    };

    Some(SeasonUsage {
        winter: scaled(Season::Winter),
        spring: scaled(Season::Spring),
        summer: scaled(Season::Summer),
        autumn: scaled(Season::Autumn),
        day: scaled(Season::Day),
        night: scaled(Season::Night),
    })
}

/// Whole-phrase, case-insensitive containment.
fn contains_phrase(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let begin = start + pos;
        let end = begin + needle.len();
        let before_ok = haystack[..begin]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end;
    }
    false
}

fn is_vote_row(element: ElementRef<'_>) -> bool {
    let name = element.value().name();
    name == "tr"
        || name == "li"
        || element
            .value()
            .attr("class")
            .is_some_and(|c| c.to_lowercase().contains("vote"))
}

/// Vote rows under `container` as `(label text, count)`.
fn vote_rows(container: ElementRef<'_>) -> Vec<(String, u64)> {
    container
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| is_vote_row(*el))
        .filter_map(|row| {
            let text = element_text(row).to_lowercase();
            if text.len() > MAX_ROW_LEN {
                return None;
            }
            let count = parse_vote_count(&text)?;
            Some((text, count))
        })
        .collect()
}

fn category_for(spec: &MetricSpec, text: &str) -> Option<&'static str> {
    spec.categories
        .iter()
        .find(|(label, _)| contains_phrase(text, label))
        .map(|(_, key)| *key)
}

fn performance(doc: &Document, spec: &MetricSpec) -> Option<PerformanceMetric> {
    let mut votes: BTreeMap<String, u64> = BTreeMap::new();

    let anchors = doc
        .html()
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| {
            let text = element_text(*el).to_lowercase();
            text.len() <= MAX_KEYWORD_LEN && spec.keywords.iter().any(|k| text.contains(k))
        });

    for anchor in anchors {
        for container in anchor.ancestors().filter_map(ElementRef::wrap).take(ANCESTOR_SCAN) {
            let matched: Vec<(&'static str, u64)> = vote_rows(container)
                .into_iter()
                .filter_map(|(text, count)| category_for(spec, &text).map(|key| (key, count)))
                .collect();
            if matched.is_empty() {
                continue;
            }
            // Nested scans see the same rows more than once; keep the max.
            for (key, count) in matched {
                let slot = votes.entry(key.to_string()).or_insert(0);
                *slot = (*slot).max(count);
            }
            break;
        }
    }

    build_metric(spec, votes)
}

fn build_metric(spec: &MetricSpec, votes: BTreeMap<String, u64>) -> Option<PerformanceMetric> {
    let total: u64 = votes.values().sum();
    if total == 0 {
        return None;
    }

    // Ties go to the category listed first in the widget vocabulary.
    let dominant = spec
        .categories
        .iter()
        .map(|(_, key)| *key)
        .filter_map(|key| votes.get(key).map(|count| (key, *count)))
        .fold(None, |best: Option<(&str, u64)>, (key, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((key, count)),
        })?;

    tracing::trace!(field = spec.field, dominant = dominant.0, total, "performance votes aggregated");

    Some(PerformanceMetric {
        dominant: dominant.0.to_string(),
        percentage: (dominant.1 as f64 * 100.0 / total as f64).round() as i32,
        votes,
    })
}

fn season_for(text: &str) -> Option<Season> {
    let matches: Vec<Season> = SEASON_LABELS
        .iter()
        .filter(|(label, _)| contains_phrase(text, label))
        .map(|(_, season)| *season)
        .collect();
    match matches.as_slice() {
        [season] => Some(*season),
        [first, rest @ ..] if rest.iter().all(|s| s == first) => Some(*first),
        _ => None,
    }
}

fn record_season(votes: &mut HashMap<Season, u64>, season: Season, count: u64) {
    let slot = votes.entry(season).or_insert(0);
    *slot = (*slot).max(count);
}

fn non_empty_votes(votes: HashMap<Season, u64>) -> Option<HashMap<Season, u64>> {
    if votes.values().any(|v| *v > 0) {
        Some(votes)
    } else {
        None
    }
}

fn season_vote_rows(doc: &Document) -> Option<HashMap<Season, u64>> {
    let mut votes = HashMap::new();
    for (text, count) in vote_rows(doc.html().root_element()) {
        if let Some(season) = season_for(&text) {
            record_season(&mut votes, season, count);
        }
    }
    non_empty_votes(votes)
}

/// A bare bucket label with its count in a neighbouring element.
fn season_adjacent_text(doc: &Document) -> Option<HashMap<Season, u64>> {
    let mut votes = HashMap::new();

    let labels = doc
        .html()
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| {
            let text = element_text(el).to_lowercase();
            SEASON_LABELS
                .iter()
                .find(|(label, _)| *label == text)
                .map(|(_, season)| (el, *season))
        });

    for (label, season) in labels {
        let neighbours = label
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take(1)
            .chain(label.prev_siblings().filter_map(ElementRef::wrap).take(1));
        let count = neighbours
            .map(element_text)
            .find_map(|t| parse_vote_count(&t))
            .or_else(|| {
                label
                    .parent()
                    .and_then(ElementRef::wrap)
                    .map(element_text)
                    .filter(|t| t.len() <= MAX_ROW_LEN)
                    .and_then(|t| parse_vote_count(&t))
            });
        if let Some(count) = count {
            record_season(&mut votes, season, count);
        }
    }

    non_empty_votes(votes)
}

fn season_labelled_text(doc: &Document) -> Option<HashMap<Season, u64>> {
    let mut votes = HashMap::new();
    for caps in SEASON_COLON.captures_iter(doc.text()) {
        let (Some(label), Some(count)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let Some(season) = season_for(&label.as_str().to_lowercase()) else {
            continue;
        };
        if let Some(count) = parse_vote_count(count.as_str()) {
            record_season(&mut votes, season, count);
        }
    }
    non_empty_votes(votes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html";

    #[test]
    fn test_parse_vote_count() {
        assert_eq!(parse_vote_count("120"), Some(120));
        assert_eq!(parse_vote_count("long lasting 1.2k"), Some(1200));
        assert_eq!(parse_vote_count("1,204 votes"), Some(1204));
        assert_eq!(parse_vote_count("no votes"), None);
    }

    #[test]
    fn test_season_normalization() {
        let votes = HashMap::from([
            (Season::Summer, 120),
            (Season::Winter, 40),
            (Season::Spring, 0),
        ]);
        let usage = normalize_season_votes(&votes).unwrap();
        assert_eq!(usage.summer, 100);
        assert_eq!(usage.winter, 33);
        assert_eq!(usage.spring, 0);
        assert_eq!(usage.night, 0);
    }

    #[test]
    fn test_season_without_signal_is_none() {
        let votes = HashMap::from([(Season::Summer, 0), (Season::Winter, 0)]);
        assert_eq!(normalize_season_votes(&votes), None);
        assert_eq!(normalize_season_votes(&HashMap::new()), None);
    }

    #[test]
    fn test_longevity_and_sillage_blocks() {
        let html = r#"<html><body>
          <div class="longevity-block">
            <h4>Longevity</h4>
            <div class="vote-button"><span class="vote-button-name">very weak</span><span class="vote-button-legend">50</span></div>
            <div class="vote-button"><span class="vote-button-name">weak</span><span class="vote-button-legend">100</span></div>
            <div class="vote-button"><span class="vote-button-name">long lasting</span><span class="vote-button-legend">350</span></div>
          </div>
          <div class="sillage-block">
            <h4>Sillage</h4>
            <div class="vote-button"><span class="vote-button-name">moderate</span><span class="vote-button-legend">1k</span></div>
            <div class="vote-button"><span class="vote-button-name">strong</span><span class="vote-button-legend">3k</span></div>
          </div>
        </body></html>"#;
        let doc = Document::parse(html, URL);

        let longevity = longevity(&doc).unwrap();
        assert_eq!(longevity.dominant, "long_lasting");
        assert_eq!(longevity.percentage, 70);
        assert_eq!(longevity.votes.get("very_weak"), Some(&50));
        assert_eq!(longevity.votes.get("weak"), Some(&100));

        let sillage = sillage(&doc).unwrap();
        assert_eq!(sillage.dominant, "strong");
        assert_eq!(sillage.percentage, 75);
    }

    #[test]
    fn test_spanish_sillage_keyword() {
        let html = r#"<html><body><div>
            <span>Estela</span>
            <ul><li>suave 10</li><li>enorme 30</li></ul>
        </div></body></html>"#;
        let sillage = sillage(&Document::parse(html, "https://www.fragrantica.es/perfume/x.html")).unwrap();
        assert_eq!(sillage.dominant, "enormous");
        assert_eq!(sillage.percentage, 75);
    }

    #[test]
    fn test_no_votes_means_none() {
        let doc = Document::parse("<html><body><h4>Longevity</h4><p>no data</p></body></html>", URL);
        assert_eq!(longevity(&doc), None);
        assert_eq!(season_usage(&doc), None);
    }

    #[test]
    fn test_season_vote_rows() {
        let html = r#"<html><body><ul class="seasons">
            <li class="vote">winter 40</li><li class="vote">summer 120</li><li class="vote">night 1.2k</li>
        </ul></body></html>"#;
        let usage = season_usage(&Document::parse(html, URL)).unwrap();
        assert_eq!(usage.night, 100);
        assert_eq!(usage.summer, 10);
        assert_eq!(usage.winter, 3);
        assert_eq!(usage.day, 0);
    }

    #[test]
    fn test_season_adjacent_text() {
        let html = r#"<html><body>
            <div><span>spring</span><span>25</span></div>
            <div><span>autumn</span><span>100</span></div>
        </body></html>"#;
        let usage = season_usage(&Document::parse(html, URL)).unwrap();
        assert_eq!(usage.autumn, 100);
        assert_eq!(usage.spring, 25);
    }

    #[test]
    fn test_contains_phrase_respects_word_boundaries() {
        assert!(contains_phrase("very weak 50", "weak"));
        assert!(!contains_phrase("7 days", "day"));
        assert!(contains_phrase("día 12", "día"));
    }
}
