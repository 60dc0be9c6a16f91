use scraper::ElementRef;

use super::{cascade, element_text, push_unique, select_within, Document, Strategy};
use crate::models::perfume::NotesPyramid;

const PYRAMID_CONTAINERS: &str =
    "#pyramid, [id*='pyramid'], [class*='pyramid'], .notes-box, [class*='notes-list']";

const HEADER_TAGS: [&str; 13] = [
    "h2", "h3", "h4", "h5", "h6", "b", "strong", "span", "p", "div", "dt", "th", "label",
];

const MAX_HEADER_LEN: usize = 40;
const MAX_NOTE_LEN: usize = 60;

const PYRAMID_STRATEGIES: [Strategy<NotesPyramid>; 4] = [
    Strategy { name: "scoped_container", run: scoped_container },
    Strategy { name: "header_siblings", run: header_siblings },
    Strategy { name: "document_pass", run: document_pass },
    Strategy { name: "unclassified_links", run: unclassified_links },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Top,
    Heart,
    Base,
}

pub(super) fn pyramid(doc: &Document) -> NotesPyramid {
    cascade("notes", doc, &PYRAMID_STRATEGIES).unwrap_or_default()
}

fn section_for(text: &str) -> Option<Section> {
    let lower = text.to_lowercase();
    if lower.len() > MAX_HEADER_LEN {
        return None;
    }
    if ["top notes", "top note", "notas de salida", "notas altas"]
        .iter()
        .any(|k| lower.contains(k))
    {
        Some(Section::Top)
    } else if [
        "middle notes",
        "middle note",
        "heart notes",
        "heart note",
        "notas de corazón",
        "notas de corazon",
        "notas medias",
    ]
    .iter()
    .any(|k| lower.contains(k))
    {
        Some(Section::Heart)
    } else if ["base notes", "base note", "notas de fondo", "notas base"]
        .iter()
        .any(|k| lower.contains(k))
    {
        Some(Section::Base)
    } else {
        None
    }
}

fn header_section(element: ElementRef<'_>) -> Option<Section> {
    if !HEADER_TAGS.contains(&element.value().name()) {
        return None;
    }
    section_for(&element_text(element))
}

fn is_note_link(element: ElementRef<'_>) -> bool {
    element.value().name() == "a"
        && element
            .value()
            .attr("href")
            .is_some_and(|href| href.contains("/notes/") || href.contains("/notas/") || href.contains("/note/"))
}

/// A note link's label: its text, else the icon's alt, else a short ancestor caption.
fn note_name(link: ElementRef<'_>) -> Option<String> {
    let text = element_text(link);
    if !text.is_empty() {
        return Some(text);
    }
    let from_img = select_within(link, "img").into_iter().find_map(|img| {
        img.value()
            .attr("alt")
            .or_else(|| img.value().attr("title"))
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
    });
    if from_img.is_some() {
        return from_img;
    }
    if let Some(title) = link.value().attr("title").map(str::trim).filter(|t| !t.is_empty()) {
        return Some(title.to_string());
    }
    link.ancestors()
        .take(2)
        .filter_map(ElementRef::wrap)
        .map(element_text)
        .find(|t| !t.is_empty() && t.len() <= MAX_NOTE_LEN)
}

fn bucket(pyramid: &mut NotesPyramid, section: Section) -> &mut Vec<String> {
    match section {
        Section::Top => &mut pyramid.top,
        Section::Heart => &mut pyramid.heart,
        Section::Base => &mut pyramid.base,
    }
}

fn non_empty_pyramid(pyramid: NotesPyramid) -> Option<NotesPyramid> {
    if pyramid.is_empty() {
        None
    } else {
        Some(pyramid)
    }
}

/// Walk elements in document order, switching section on each recognized header.
fn walk<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> NotesPyramid {
    let mut pyramid = NotesPyramid::default();
    let mut current = None;

    for element in elements {
        if is_note_link(element) {
            if let (Some(section), Some(name)) = (current, note_name(element)) {
                push_unique(bucket(&mut pyramid, section), name);
            }
        } else if let Some(section) = header_section(element) {
            current = Some(section);
        }
    }

    pyramid
}

fn scoped_container(doc: &Document) -> Option<NotesPyramid> {
    doc.select(PYRAMID_CONTAINERS).into_iter().find_map(|container| {
        non_empty_pyramid(walk(container.descendants().filter_map(ElementRef::wrap)))
    })
}

fn header_siblings(doc: &Document) -> Option<NotesPyramid> {
    let mut pyramid = NotesPyramid::default();
    let headers = doc
        .html()
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter_map(|el| header_section(el).map(|section| (el, section)));

    for (header, section) in headers {
        for sibling in header.next_siblings().filter_map(ElementRef::wrap) {
            let contains_header = sibling
                .descendants()
                .filter_map(ElementRef::wrap)
                .any(|el| !is_note_link(el) && header_section(el).is_some());
            if contains_header {
                break;
            }
            let links = std::iter::once(sibling)
                .chain(sibling.descendants().skip(1).filter_map(ElementRef::wrap))
                .filter(|el| is_note_link(*el));
            for link in links {
                if let Some(name) = note_name(link) {
                    push_unique(bucket(&mut pyramid, section), name);
                }
            }
        }
    }

    non_empty_pyramid(pyramid)
}

fn document_pass(doc: &Document) -> Option<NotesPyramid> {
    non_empty_pyramid(walk(
        doc.html().root_element().descendants().filter_map(ElementRef::wrap),
    ))
}

/// Last resort: every note link goes to `heart`, never into invented top/base tiers.
fn unclassified_links(doc: &Document) -> Option<NotesPyramid> {
    let mut pyramid = NotesPyramid::default();
    for link in doc
        .html()
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| is_note_link(*el))
    {
        if let Some(name) = note_name(link) {
            push_unique(&mut pyramid.heart, name);
        }
    }
    non_empty_pyramid(pyramid)
}
