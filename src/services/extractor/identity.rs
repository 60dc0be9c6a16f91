use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use scraper::ElementRef;

use super::{cascade, element_text, non_empty, select_within, Document, Strategy};
use crate::models::perfume::{Concentration, Gender};

static GENDER_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\s+(?:for\s+(?:women\s+and\s+men|men\s+and\s+women|women|men)|para\s+(?:mujeres\s+y\s+hombres|hombres\s+y\s+mujeres|mujeres|hombres))\s*$",
    )
    .expect("valid gender suffix regex")
});

static PRODUCT_WORD_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:perfume|cologne|fragrance|perfumes?\s+y\s+colonias?)\s*$")
        .expect("valid product word regex")
});

static YEAR_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)launched\s+in\s+(\d{4})",
        r"(?i)released\s+in\s+(\d{4})",
        r"(?i)lanzad[oa]\s+en\s+(?:el\s+)?(?:año\s+)?(\d{4})",
        r"\((\d{4})\)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid year regex"))
    .collect()
});

static UNISEX_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:for\s+women\s+and\s+men|for\s+men\s+and\s+women|unisex|para\s+mujeres\s+y\s+hombres|para\s+hombres\s+y\s+mujeres)\b",
    )
    .expect("valid unisex regex")
});

static FEMININE_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:for\s+women|para\s+mujeres)\b").expect("valid feminine regex"));

static MASCULINE_PHRASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:for\s+men|para\s+hombres)\b").expect("valid masculine regex"));

/// Checked in order; "parfum" alone is the loosest match and must come last.
static CONCENTRATION_PATTERNS: LazyLock<Vec<(Regex, Concentration)>> = LazyLock::new(|| {
    [
        (r"(?i)\b(?:extrait(?:\s+de\s+parfum)?|extract)\b", Concentration::Extrait),
        (r"(?i)\b(?:eau\s+de\s+parfum|edp)\b", Concentration::EauDeParfum),
        (r"(?i)\b(?:eau\s+de\s+toilette|edt)\b", Concentration::EauDeToilette),
        (r"(?i)\b(?:eau\s+de\s+cologne|edc)\b", Concentration::EauDeCologne),
        (r"(?i)\beau\s+fra[iî]che\b", Concentration::EauFraiche),
        (r"(?i)\bparfum\b", Concentration::Parfum),
    ]
    .into_iter()
    .map(|(p, c)| (Regex::new(p).expect("valid concentration regex"), c))
    .collect()
});

const TITLE_SEPARATORS: [&str; 4] = [" - ", " | ", " – ", " — "];

const NAME_STRATEGIES: [Strategy<String>; 3] = [
    Strategy { name: "schema_heading", run: schema_heading },
    Strategy { name: "og_title", run: og_title_prefix },
    Strategy { name: "title_prefix", run: title_prefix },
];

const BRAND_STRATEGIES: [Strategy<String>; 3] = [
    Strategy { name: "schema_brand_name", run: schema_brand_name },
    Strategy { name: "schema_brand", run: schema_brand },
    Strategy { name: "designer_link", run: designer_link },
];

const GENDER_STRATEGIES: [Strategy<Gender>; 2] = [
    Strategy { name: "heading", run: gender_in_heading },
    Strategy { name: "body", run: gender_in_body },
];

const CONCENTRATION_STRATEGIES: [Strategy<Concentration>; 2] = [
    Strategy { name: "heading", run: concentration_in_heading },
    Strategy { name: "body", run: concentration_in_body },
];

pub(super) fn name(doc: &Document, brand: Option<&str>) -> Option<String> {
    cascade("name", doc, &NAME_STRATEGIES).and_then(|raw| clean_name(&raw, brand))
}

pub(super) fn brand(doc: &Document) -> Option<String> {
    cascade("brand", doc, &BRAND_STRATEGIES)
}

pub(super) fn year(doc: &Document) -> Option<i32> {
    let current_year = Utc::now().year();
    YEAR_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(doc.text())
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
            .find(|year| (1900..=current_year).contains(year))
    })
}

pub(super) fn gender(doc: &Document) -> Option<Gender> {
    cascade("gender", doc, &GENDER_STRATEGIES)
}

pub(super) fn concentration(doc: &Document) -> Option<Concentration> {
    cascade("concentration", doc, &CONCENTRATION_STRATEGIES)
}

/// Perfumer name and portrait from the nose link block.
pub(super) fn perfumer(doc: &Document) -> (Option<String>, Option<String>) {
    let link = doc
        .select("a[href*='/noses/'], a[href*='/narices/'], a[href*='/nez/']")
        .into_iter()
        .find(|a| !element_text(*a).is_empty());

    let Some(link) = link else {
        return (None, None);
    };

    let image = image_src(link).or_else(|| {
        link.parent()
            .and_then(ElementRef::wrap)
            .and_then(image_src)
    });

    (
        non_empty(element_text(link)),
        image.and_then(|src| doc.absolutize(&src)),
    )
}

fn image_src(element: ElementRef<'_>) -> Option<String> {
    select_within(element, "img")
        .into_iter()
        .find_map(|img| {
            img.value()
                .attr("src")
                .or_else(|| img.value().attr("data-src"))
                .map(str::to_string)
        })
}

/// Strip the trailing gender phrase, product word and duplicated brand.
pub(crate) fn clean_name(raw: &str, brand: Option<&str>) -> Option<String> {
    let mut name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    name = GENDER_SUFFIX.replace(&name, "").into_owned();
    name = PRODUCT_WORD_SUFFIX.replace(&name, "").into_owned();

    if let Some(brand) = brand.map(str::trim).filter(|b| !b.is_empty()) {
        let cut = name
            .char_indices()
            .map(|(i, _)| i)
            .filter(|&i| i > 0)
            .find(|&i| name[i..].eq_ignore_ascii_case(brand) && name[..i].ends_with(' '));
        if let Some(i) = cut {
            name.truncate(i);
        }
    }

    non_empty(name.trim().to_string())
}

pub(crate) fn classify_gender(text: &str) -> Option<Gender> {
    if UNISEX_PHRASE.is_match(text) {
        return Some(Gender::Unisex);
    }
    match (FEMININE_PHRASE.is_match(text), MASCULINE_PHRASE.is_match(text)) {
        (true, true) => Some(Gender::Unisex),
        (true, false) => Some(Gender::Feminine),
        (false, true) => Some(Gender::Masculine),
        (false, false) => None,
    }
}

fn gender_in_heading(doc: &Document) -> Option<Gender> {
    classify_gender(doc.heading())
}

fn gender_in_body(doc: &Document) -> Option<Gender> {
    classify_gender(doc.text())
}

fn concentration_in_heading(doc: &Document) -> Option<Concentration> {
    match_concentration(doc.heading())
}

fn concentration_in_body(doc: &Document) -> Option<Concentration> {
    match_concentration(doc.text())
}

fn match_concentration(text: &str) -> Option<Concentration> {
    CONCENTRATION_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(text))
        .map(|(_, concentration)| *concentration)
}

fn schema_heading(doc: &Document) -> Option<String> {
    doc.select("h1[itemprop='name']")
        .into_iter()
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn og_title_prefix(doc: &Document) -> Option<String> {
    doc.select("meta[property='og:title']")
        .into_iter()
        .find_map(|m| m.value().attr("content").and_then(title_before_separator))
}

fn title_prefix(doc: &Document) -> Option<String> {
    doc.select("title")
        .into_iter()
        .find_map(|t| title_before_separator(&element_text(t)))
}

fn title_before_separator(title: &str) -> Option<String> {
    let cut = TITLE_SEPARATORS
        .iter()
        .filter_map(|sep| title.find(sep))
        .min()
        .unwrap_or(title.len());
    non_empty(title[..cut].trim().to_string())
}

fn schema_brand_name(doc: &Document) -> Option<String> {
    doc.select("[itemprop='brand'] [itemprop='name']")
        .into_iter()
        .find_map(|el| {
            el.value()
                .attr("content")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .or_else(|| non_empty(element_text(el)))
        })
}

fn schema_brand(doc: &Document) -> Option<String> {
    doc.select("[itemprop='brand']")
        .into_iter()
        .find_map(|el| {
            el.value()
                .attr("content")
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .or_else(|| non_empty(element_text(el)))
        })
}

fn designer_link(doc: &Document) -> Option<String> {
    doc.select("a[href*='/designers/'], a[href*='/disenadores/'], a[href*='/designer/']")
        .into_iter()
        .map(element_text)
        .find(|t| !t.is_empty())
}
