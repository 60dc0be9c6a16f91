use std::sync::LazyLock;

use regex::Regex;

use super::{cascade, element_text, non_empty, Document, Strategy};

static DECIMAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:[.,]\d+)?").expect("valid decimal regex"));

const MIN_TAGGED_DESCRIPTION: usize = 50;
const MIN_PARAGRAPH: usize = 100;
const MAX_PARAGRAPH: usize = 2000;

/// Words that mark a paragraph as site chrome rather than product copy.
const BOILERPLATE: [&str; 10] = [
    "cookie",
    "privacy",
    "sign in",
    "log in",
    "login",
    "register",
    "newsletter",
    "copyright",
    "all rights reserved",
    "terms of use",
];

const RATING_STRATEGIES: [Strategy<f64>; 4] = [
    Strategy { name: "schema_content", run: rating_schema_content },
    Strategy { name: "schema_text", run: rating_schema_text },
    Strategy { name: "meta", run: rating_meta },
    Strategy { name: "data_attribute", run: rating_data_attribute },
];

const DESCRIPTION_STRATEGIES: [Strategy<String>; 2] = [
    Strategy { name: "tagged", run: tagged_description },
    Strategy { name: "longest_paragraph", run: longest_paragraph },
];

const IMAGE_STRATEGIES: [Strategy<String>; 3] = [
    Strategy { name: "schema_image", run: schema_image },
    Strategy { name: "picture_source", run: picture_source },
    Strategy { name: "perfume_img", run: perfume_img },
];

pub(super) fn rating(doc: &Document) -> Option<f64> {
    cascade("rating", doc, &RATING_STRATEGIES)
}

pub(super) fn description(doc: &Document) -> Option<String> {
    cascade("description", doc, &DESCRIPTION_STRATEGIES)
}

pub(super) fn image_url(doc: &Document) -> Option<String> {
    cascade("image_url", doc, &IMAGE_STRATEGIES)
}

/// Bring a rating onto the 0-5 scale, halving anything from a 0-10 scale,
/// and round to one decimal.
pub fn normalize_rating(raw: f64) -> Option<f64> {
    if !raw.is_finite() || raw < 0.0 || raw > 10.0 {
        return None;
    }
    let scaled = if raw > 5.0 { raw / 2.0 } else { raw };
    Some((scaled * 10.0).round() / 10.0)
}

fn parse_decimal(text: &str) -> Option<f64> {
    DECIMAL
        .find(text)
        .and_then(|m| m.as_str().replace(',', ".").parse::<f64>().ok())
}

/// A decimal that lands on the rating scale; out-of-range values fall through.
fn parse_rating(text: &str) -> Option<f64> {
    parse_decimal(text).and_then(normalize_rating)
}

fn rating_schema_content(doc: &Document) -> Option<f64> {
    doc.select("[itemprop='ratingValue']")
        .into_iter()
        .find_map(|el| el.value().attr("content").and_then(parse_rating))
}

fn rating_schema_text(doc: &Document) -> Option<f64> {
    doc.select("[itemprop='ratingValue']")
        .into_iter()
        .find_map(|el| parse_rating(&element_text(el)))
}

fn rating_meta(doc: &Document) -> Option<f64> {
    doc.select("meta[name='rating'], meta[property='og:rating'], meta[itemprop='ratingValue']")
        .into_iter()
        .find_map(|el| el.value().attr("content").and_then(parse_rating))
}

fn rating_data_attribute(doc: &Document) -> Option<f64> {
    doc.select("[data-rating]")
        .into_iter()
        .find_map(|el| el.value().attr("data-rating").and_then(parse_rating))
}

fn tagged_description(doc: &Document) -> Option<String> {
    doc.select("[itemprop='description']")
        .into_iter()
        .map(|el| {
            el.value()
                .attr("content")
                .map(|c| c.split_whitespace().collect::<Vec<_>>().join(" "))
                .unwrap_or_else(|| element_text(el))
        })
        .find(|text| text.chars().count() > MIN_TAGGED_DESCRIPTION)
}

fn longest_paragraph(doc: &Document) -> Option<String> {
    doc.select("p")
        .into_iter()
        .map(element_text)
        .filter(|text| (MIN_PARAGRAPH..=MAX_PARAGRAPH).contains(&text.chars().count()))
        .filter(|text| {
            let lower = text.to_lowercase();
            !BOILERPLATE.iter().any(|word| lower.contains(word))
        })
        .max_by_key(|text| text.chars().count())
}

fn schema_image(doc: &Document) -> Option<String> {
    doc.select("[itemprop='image']").into_iter().find_map(|el| {
        let value = el.value();
        value
            .attr("content")
            .or_else(|| value.attr("src"))
            .or_else(|| value.attr("href"))
            .and_then(|src| doc.absolutize(src))
    })
}

/// First candidate of a `srcset` from a modern-format `<source>`.
fn picture_source(doc: &Document) -> Option<String> {
    doc.select("picture source[type='image/avif'], picture source[type='image/webp']")
        .into_iter()
        .find_map(|el| {
            let srcset = el.value().attr("srcset")?;
            let first = srcset.split(',').next()?.split_whitespace().next()?;
            doc.absolutize(first)
        })
}

fn perfume_img(doc: &Document) -> Option<String> {
    let heading = doc.heading().to_lowercase();
    doc.select("img")
        .into_iter()
        .filter(|img| {
            let value = img.value();
            let src = value.attr("src").unwrap_or_default().to_lowercase();
            let alt = value.attr("alt").unwrap_or_default().to_lowercase();
            let class = value.attr("class").unwrap_or_default().to_lowercase();
            src.contains("/perfume/")
                || src.contains("mdimg")
                || class.contains("perfume")
                || (!heading.is_empty() && alt.contains(&heading))
        })
        .find_map(|img| {
            img.value()
                .attr("src")
                .or_else(|| img.value().attr("data-src"))
                .and_then(|src| doc.absolutize(src))
        })
        .and_then(non_empty)
}
