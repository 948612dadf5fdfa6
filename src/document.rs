//! Read-only view over a rendered page.
//!
//! [`RenderedDocument`] is the narrow capability the extractor needs. The
//! browser adapter serializes the live DOM and [`HtmlSnapshot`] answers the
//! queries over that snapshot.

use scraper::{ElementRef, Html, Selector};

use crate::error::HarvestError;

/// Element-level queries over a rendered document.
///
/// Nodes are cheap handles that stay valid as long as the document is
/// borrowed.
pub trait RenderedDocument {
    type Node<'a>: Copy
    where
        Self: 'a;

    /// First element with the given tag name, in document order.
    fn first_by_tag(&self, tag: &str) -> Option<Self::Node<'_>>;

    fn body(&self) -> Option<Self::Node<'_>>;

    /// Descendants of `root` whose tag is one of `tags`, in document order.
    fn descendants_by_tags<'a>(&'a self, root: Self::Node<'a>, tags: &[&str])
    -> Vec<Self::Node<'a>>;

    /// Lowercase tag name.
    fn tag_name<'a>(&'a self, node: Self::Node<'a>) -> &'a str;

    /// Concatenated text of the node and its descendants, untrimmed.
    fn text_content<'a>(&'a self, node: Self::Node<'a>) -> String;

    fn next_element_sibling<'a>(&'a self, node: Self::Node<'a>) -> Option<Self::Node<'a>>;
}

/// Parsed HTML of one page state.
///
/// Not `Send`: parse, query and drop it without crossing an await point.
pub struct HtmlSnapshot {
    html: Html,
}

impl HtmlSnapshot {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    pub fn selector(css: &str) -> Result<Selector, HarvestError> {
        Selector::parse(css).map_err(|err| HarvestError::selector(css, err))
    }

    /// First element matching `selector`, if any.
    pub fn select_first(&self, selector: &Selector) -> Option<ElementRef<'_>> {
        self.html.select(selector).next()
    }

    fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
    }
}

impl RenderedDocument for HtmlSnapshot {
    type Node<'a> = ElementRef<'a>;

    fn first_by_tag(&self, tag: &str) -> Option<ElementRef<'_>> {
        self.elements().find(|el| el.value().name() == tag)
    }

    fn body(&self) -> Option<ElementRef<'_>> {
        self.first_by_tag("body")
    }

    fn descendants_by_tags<'a>(&'a self, root: ElementRef<'a>, tags: &[&str]) -> Vec<ElementRef<'a>> {
        root.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| tags.contains(&el.value().name()))
            .collect()
    }

    fn tag_name<'a>(&'a self, node: ElementRef<'a>) -> &'a str {
        node.value().name()
    }

    fn text_content<'a>(&'a self, node: ElementRef<'a>) -> String {
        node.text().collect()
    }

    fn next_element_sibling<'a>(&'a self, node: ElementRef<'a>) -> Option<ElementRef<'a>> {
        node.next_siblings().find_map(ElementRef::wrap)
    }
}
