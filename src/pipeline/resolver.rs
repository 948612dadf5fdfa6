//! Selector resolution over a listing snapshot.

use std::time::Duration;

use scraper::ElementRef;

use crate::document::HtmlSnapshot;
use crate::error::HarvestError;
use crate::pipeline::ListingLayout;
use crate::session::BrowsingSession;
use crate::timing::with_deadline;

/// Locators for the first `cap` entries of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedListing {
    pub locators: Vec<String>,
    /// Entries found before truncation.
    pub total: usize,
    pub container_found: bool,
}

impl ResolvedListing {
    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }
}

/// Resolve locators from a parsed snapshot.
///
/// Entries are the direct children of the first container matching the
/// entry selector. An entry at element position `i` (1-based, counted among
/// all of the container's element children) yields
/// `"{container} > {entry}:nth-child({i}) > {target}"`, so a page-wide
/// query lands inside the container. A missing container is an empty
/// result, not an error.
pub fn resolve_snapshot(
    snapshot: &HtmlSnapshot,
    layout: &ListingLayout,
    cap: usize,
) -> Result<ResolvedListing, HarvestError> {
    let container_selector = HtmlSnapshot::selector(&layout.container)?;
    let entry_selector = HtmlSnapshot::selector(&layout.entry)?;
    HtmlSnapshot::selector(&layout.target)?;

    let Some(container) = snapshot.select_first(&container_selector) else {
        return Ok(ResolvedListing::default());
    };

    let positions: Vec<usize> = container
        .children()
        .filter_map(ElementRef::wrap)
        .enumerate()
        .filter(|(_, child)| entry_selector.matches(child))
        .map(|(offset, _)| offset + 1)
        .collect();
    let total = positions.len();
    let locators = positions
        .into_iter()
        .take(cap)
        .map(|index| {
            format!(
                "{} > {}:nth-child({index}) > {}",
                layout.container, layout.entry, layout.target
            )
        })
        .collect();

    Ok(ResolvedListing {
        locators,
        total,
        container_found: true,
    })
}

/// Snapshot the current page and resolve its entries within `limit`.
pub async fn resolve_items<S>(
    session: &S,
    layout: &ListingLayout,
    cap: usize,
    limit: Duration,
) -> Result<ResolvedListing, HarvestError>
where
    S: BrowsingSession + ?Sized,
{
    with_deadline("resolve", limit, async {
        let html = session.content().await?;
        let snapshot = HtmlSnapshot::parse(&html);
        resolve_snapshot(&snapshot, layout, cap)
    })
    .await
}
