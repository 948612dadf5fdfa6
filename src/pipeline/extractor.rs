//! Turn a rendered detail page into a [`Record`].

use std::time::Duration;

use crate::document::{HtmlSnapshot, RenderedDocument};
use crate::error::HarvestError;
use crate::session::BrowsingSession;
use crate::types::{Record, Section};

const SUBSECTION_TAGS: [&str; 2] = ["h2", "h3"];
const BOUNDARY_TAGS: [&str; 3] = ["h1", "h2", "h3"];
const SKIPPED_TAGS: [&str; 2] = ["img", "figure"];

/// Extract the title and subsections of a detail page.
///
/// The title is the first `h1` anywhere in the document. Subsections are the
/// `h2`/`h3` headings of the first `article` (or the body), each followed by
/// the text of its element siblings up to the next heading. Sections with an
/// empty heading or body are dropped.
pub fn extract_record<D>(doc: &D) -> Record
where
    D: RenderedDocument + ?Sized,
{
    let title = doc
        .first_by_tag("h1")
        .map(|heading| doc.text_content(heading).trim().to_string())
        .unwrap_or_default();

    let sections = match doc.first_by_tag("article").or_else(|| doc.body()) {
        Some(region) => doc
            .descendants_by_tags(region, &SUBSECTION_TAGS)
            .into_iter()
            .filter_map(|heading| {
                let heading_text = doc.text_content(heading).trim().to_string();
                Section::new(heading_text, section_body(doc, heading))
            })
            .collect(),
        None => Vec::new(),
    };

    Record { title, sections }
}

fn section_body<'a, D>(doc: &'a D, heading: D::Node<'a>) -> String
where
    D: RenderedDocument + ?Sized,
{
    let mut parts = Vec::new();
    let mut cursor = doc.next_element_sibling(heading);
    while let Some(node) = cursor {
        let tag = doc.tag_name(node);
        if BOUNDARY_TAGS.contains(&tag) {
            break;
        }
        if !SKIPPED_TAGS.contains(&tag) {
            let text = doc.text_content(node);
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }
        cursor = doc.next_element_sibling(node);
    }
    parts.join(" ")
}

/// Snapshot the current page and extract it within `limit`.
///
/// Expiry yields [`HarvestError::ExtractionTimeout`].
pub async fn extract_with_deadline<S>(session: &S, limit: Duration) -> Result<Record, HarvestError>
where
    S: BrowsingSession + ?Sized,
{
    match tokio::time::timeout(limit, session.content()).await {
        Ok(Ok(html)) => Ok(extract_record(&HtmlSnapshot::parse(&html))),
        Ok(Err(err)) => Err(err.into()),
        Err(_) => Err(HarvestError::ExtractionTimeout { limit }),
    }
}
