//! Wait until a detail page has enough structure to extract.

use crate::error::HarvestError;
use crate::logging::HarvestLogger;
use crate::session::{BrowsingSession, wait_for_visible};
use crate::timing::Deadlines;

pub const TITLE_SELECTOR: &str = "h1";
pub const SUBSECTION_SELECTOR: &str = "h2, h3";

/// Resolve once a visible `h1` and a visible `h2`/`h3` are both present.
///
/// Both probes run jointly against `deadlines.readiness`; expiry yields
/// [`HarvestError::ReadinessTimeout`]. A visibility check that errors while
/// the detail page settles is logged and polled again.
pub async fn await_content_ready<S>(
    session: &S,
    deadlines: &Deadlines,
    logger: &HarvestLogger,
) -> Result<(), HarvestError>
where
    S: BrowsingSession + ?Sized,
{
    let interval = deadlines.poll_interval;
    let both = async {
        tokio::try_join!(
            wait_for_visible(session, TITLE_SELECTOR, interval, logger),
            wait_for_visible(session, SUBSECTION_SELECTOR, interval, logger),
        )
    };

    match tokio::time::timeout(deadlines.readiness, both).await {
        Ok(result) => result.map(|_| ()).map_err(HarvestError::from),
        Err(_) => Err(HarvestError::ReadinessTimeout {
            limit: deadlines.readiness,
        }),
    }
}
