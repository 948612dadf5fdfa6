//! Activate a listing entry and wait for the navigation it triggers.

use serde_json::json;

use crate::error::HarvestError;
use crate::logging::HarvestLogger;
use crate::metrics::{HarvestMetrics, ItemEvent};
use crate::session::{BrowsingSession, wait_for_visible};
use crate::timing::{Deadlines, RetryPolicy, with_deadline, with_retry};

/// One attempt: wait for the target to be visible, then click it while
/// awaiting the navigation it triggers.
async fn attempt_activation<S>(
    session: &S,
    locator: &str,
    deadlines: &Deadlines,
    logger: &HarvestLogger,
) -> Result<(), HarvestError>
where
    S: BrowsingSession + ?Sized,
{
    with_deadline(
        "visibility",
        deadlines.visibility,
        wait_for_visible(session, locator, deadlines.poll_interval, logger),
    )
    .await?;

    with_deadline("navigation", deadlines.navigation, async {
        tokio::try_join!(session.wait_for_navigation(), session.click(locator)).map(|_| ())
    })
    .await
}

/// Retry [`attempt_activation`] per `policy`. Exhaustion yields
/// [`HarvestError::Interaction`] wrapping the last attempt's failure.
pub async fn activate_and_await_navigation<S>(
    session: &S,
    locator: &str,
    deadlines: &Deadlines,
    policy: &RetryPolicy,
    logger: &HarvestLogger,
    metrics: &mut HarvestMetrics,
) -> Result<(), HarvestError>
where
    S: BrowsingSession + ?Sized,
{
    with_retry(
        policy,
        |_| attempt_activation(session, locator, deadlines, logger),
        |attempt, err| {
            metrics.record(ItemEvent::InteractionRetry);
            logger.warn(
                format!("activation attempt {attempt} failed, retrying: {err}"),
                Some("interaction"),
                Some(json!({ "locator": locator, "attempt": attempt })),
            );
        },
    )
    .await
    .map_err(|source| HarvestError::Interaction {
        locator: locator.to_string(),
        attempts: policy.max_attempts.max(1),
        source: Box::new(source),
    })
}
