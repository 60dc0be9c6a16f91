//! Perfume page extraction
//!
//! Turns raw product-page HTML into an [`ExtractedPerfume`]. The source site's
//! markup differs between pages and locales, so every field is read through an
//! ordered cascade of [`Strategy`] values, each more permissive than the last.
//! A field whose cascade finds nothing is left empty; nothing here fails the
//! whole record. Only `name` and `brand` are enforced downstream.

mod accords;
mod content;
mod identity;
mod notes;
mod votes;

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use tracing::trace;
use url::Url;

use crate::models::perfume::ExtractedPerfume;

pub use content::normalize_rating;
pub use votes::{normalize_season_votes, parse_vote_count, Season};

/// Parsed page plus the derived text views most strategies work on.
pub struct Document {
    html: Html,
    text: String,
    heading: String,
    base_url: Option<Url>,
}

impl Document {
    pub fn parse(html: &str, page_url: &str) -> Self {
        let html = Html::parse_document(html);
        let text = collapse_whitespace(&visible_text(html.root_element()));
        let heading = select_all(&html, "h1")
            .first()
            .map(|h| element_text(*h))
            .unwrap_or_default();

        Self {
            html,
            text,
            heading,
            base_url: Url::parse(page_url).ok(),
        }
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Visible body text with whitespace collapsed (scripts and styles dropped).
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Text of the first `<h1>`, empty when the page has none.
    pub fn heading(&self) -> &str {
        &self.heading
    }

    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        select_all(&self.html, css)
    }

    /// Resolve protocol-relative and site-relative references against the page URL.
    pub fn absolutize(&self, reference: &str) -> Option<String> {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with("data:") {
            return None;
        }
        if let Some(rest) = reference.strip_prefix("//") {
            return Some(format!("https://{}", rest));
        }
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Some(reference.to_string());
        }
        self.base_url
            .as_ref()
            .and_then(|base| base.join(reference).ok())
            .map(|u| u.to_string())
    }
}

/// One way of reading a field off a page.
pub struct Strategy<T> {
    pub name: &'static str,
    pub run: fn(&Document) -> Option<T>,
}

/// Try each strategy in order and keep the first hit.
pub fn cascade<T>(field: &'static str, doc: &Document, strategies: &[Strategy<T>]) -> Option<T> {
    strategies.iter().find_map(|strategy| {
        let value = (strategy.run)(doc);
        if value.is_some() {
            trace!(field, strategy = strategy.name, "extraction strategy matched");
        }
        value
    })
}

/// Extract every known attribute from a product page.
pub fn extract(html: &str, page_url: &str) -> ExtractedPerfume {
    let doc = Document::parse(html, page_url);
    extract_document(&doc)
}

pub fn extract_document(doc: &Document) -> ExtractedPerfume {
    let brand = identity::brand(doc);
    let name = identity::name(doc, brand.as_deref());
    let (perfumer, perfumer_image) = identity::perfumer(doc);

    ExtractedPerfume {
        name,
        brand,
        year: identity::year(doc),
        perfumer,
        perfumer_image,
        gender: identity::gender(doc),
        concentration: identity::concentration(doc),
        notes: notes::pyramid(doc),
        accords: accords::accords(doc),
        description: content::description(doc),
        image_url: content::image_url(doc),
        rating: content::rating(doc),
        longevity: votes::longevity(doc),
        sillage: votes::sillage(doc),
        season_usage: votes::season_usage(doc),
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

fn select_all<'a>(html: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    let sel = selector(css);
    html.select(&sel).collect()
}

fn select_within<'a>(element: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    let sel = selector(css);
    element.select(&sel).collect()
}

/// Text of an element with whitespace collapsed.
fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&visible_text(element))
}

fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    push_visible_text(element, &mut out);
    out
}

fn push_visible_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el)
                if matches!(el.name(), "script" | "style" | "noscript" | "template") => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    push_visible_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Append `item` unless an equal one was seen before.
fn push_unique(list: &mut Vec<String>, item: String) {
    if !item.is_empty() && !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_skips_scripts() {
        let doc = Document::parse(
            "<html><body><h1>Title</h1><script>var x = 1;</script><p>Hello   world</p></body></html>",
            "https://www.fragrantica.com/perfume/a.html",
        );
        assert_eq!(doc.text(), "Title Hello world");
        assert_eq!(doc.heading(), "Title");
    }

    #[test]
    fn test_absolutize() {
        let doc = Document::parse("<html></html>", "https://www.fragrantica.com/perfume/Dior/Sauvage-31861.html");
        assert_eq!(
            doc.absolutize("//fimgs.net/mdimg/perfume/375x500.31861.jpg").as_deref(),
            Some("https://fimgs.net/mdimg/perfume/375x500.31861.jpg")
        );
        assert_eq!(
            doc.absolutize("/notes/Bergamot-75.html").as_deref(),
            Some("https://www.fragrantica.com/notes/Bergamot-75.html")
        );
        assert_eq!(doc.absolutize("data:image/png;base64,AAAA"), None);
    }

    #[test]
    fn test_cascade_stops_at_first_hit() {
        let doc = Document::parse("<html><body><h1>X</h1></body></html>", "https://example.com/");
        let strategies: [Strategy<&'static str>; 3] = [
            Strategy { name: "never", run: |_| None },
            Strategy { name: "first", run: |_| Some("first") },
            Strategy { name: "second", run: |_| Some("second") },
        ];
        assert_eq!(cascade("test", &doc, &strategies), Some("first"));
    }

    #[test]
    fn test_empty_document_degrades_softly() {
        let extracted = extract("<html><body></body></html>", "https://www.fragrantica.com/perfume/x.html");
        assert_eq!(extracted.name, None);
        assert_eq!(extracted.brand, None);
        assert!(extracted.notes.is_empty());
        assert!(extracted.accords.is_empty());
        assert_eq!(extracted.season_usage, None);
        assert_eq!(extracted.rating, None);
    }
}
