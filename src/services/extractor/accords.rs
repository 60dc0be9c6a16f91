use std::sync::LazyLock;

use regex::Regex;
use scraper::ElementRef;

use super::{cascade, element_text, push_unique, select_within, Document, Strategy};

static WIDTH_PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"width:\s*([\d.]+)%").expect("valid width regex"));

const MAX_ACCORD_LEN: usize = 40;
const HEADING_SIBLING_SCAN: usize = 3;

const ACCORD_STRATEGIES: [Strategy<Vec<String>>; 4] = [
    Strategy { name: "width_bars", run: width_bars },
    Strategy { name: "accord_links", run: accord_links },
    Strategy { name: "heading_links", run: heading_links },
    Strategy { name: "accord_classes", run: accord_classes },
];

/// Accord names, most prominent first.
pub(super) fn accords(doc: &Document) -> Vec<String> {
    cascade("accords", doc, &ACCORD_STRATEGIES).unwrap_or_default()
}

fn accord_name(element: ElementRef<'_>) -> Option<String> {
    let text = element_text(element).to_lowercase();
    if text.is_empty() || text.len() > MAX_ACCORD_LEN {
        None
    } else {
        Some(text)
    }
}

fn has_accord_class(element: ElementRef<'_>) -> bool {
    element
        .value()
        .attr("class")
        .is_some_and(|c| c.to_lowercase().contains("accord"))
}

fn collect(names: impl Iterator<Item = String>) -> Option<Vec<String>> {
    let mut out = Vec::new();
    for name in names {
        push_unique(&mut out, name);
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Bars whose inline width encodes prominence, sorted widest first.
fn width_bars(doc: &Document) -> Option<Vec<String>> {
    let mut bars: Vec<(f64, String)> = doc
        .select("[style*='width']")
        .into_iter()
        .filter(|el| {
            has_accord_class(*el)
                || el
                    .ancestors()
                    .take(2)
                    .filter_map(ElementRef::wrap)
                    .any(has_accord_class)
        })
        .filter_map(|el| {
            let style = el.value().attr("style")?;
            let width = WIDTH_PERCENT
                .captures(style)?
                .get(1)?
                .as_str()
                .parse::<f64>()
                .ok()?;
            Some((width, accord_name(el)?))
        })
        .collect();

    bars.sort_by(|a, b| b.0.total_cmp(&a.0));
    collect(bars.into_iter().map(|(_, name)| name))
}

fn accord_links(doc: &Document) -> Option<Vec<String>> {
    collect(
        doc.select("a[href*='/accords/'], a[href*='/acordes/']")
            .into_iter()
            .filter_map(accord_name),
    )
}

fn heading_links(doc: &Document) -> Option<Vec<String>> {
    let headings = doc
        .select("h2, h3, h4, h5, h6, b, strong")
        .into_iter()
        .filter(|h| {
            let text = element_text(*h).to_lowercase();
            text.len() <= MAX_ACCORD_LEN && (text.contains("accord") || text.contains("acorde"))
        });

    let names = headings.flat_map(|heading| {
        heading
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .take(HEADING_SIBLING_SCAN)
            .flat_map(|sibling| {
                let mut links = select_within(sibling, "a");
                if sibling.value().name() == "a" {
                    links.insert(0, sibling);
                }
                links
            })
            .filter_map(accord_name)
            .collect::<Vec<_>>()
    });

    collect(names)
}

fn accord_classes(doc: &Document) -> Option<Vec<String>> {
    collect(
        doc.select("[class*='accord']")
            .into_iter()
            .filter(|el| select_within(*el, "[class*='accord']").is_empty())
            .filter_map(accord_name),
    )
}
