//! Per-item pipeline with isolated failure recovery.

use std::path::{Path, PathBuf};

use serde_json::json;

use crate::error::HarvestError;
use crate::logging::HarvestLogger;
use crate::metrics::{HarvestMetrics, ItemEvent};
use crate::pipeline::{
    CaptureSettings, HarvestSettings, activate_and_await_navigation, await_content_ready,
    extract_with_deadline,
};
use crate::session::{BrowsingSession, WaitUntil};
use crate::timing::with_deadline;
use crate::types::Record;

/// Lowercase `title`, collapse whitespace runs into `-`, and replace path
/// separators so the result is a single file-name component.
pub fn slugify(title: &str) -> String {
    title
        .split_whitespace()
        .map(|word| word.to_lowercase().replace(['/', '\\'], "-"))
        .collect::<Vec<_>>()
        .join("-")
}

/// `{directory}/{prefix}-{slug}.png`
pub fn capture_path(capture: &CaptureSettings, title: &str) -> PathBuf {
    capture
        .directory
        .join(format!("{}-{}.png", capture.prefix, slugify(title)))
}

/// Steps 1-3: activate, wait for readiness, extract.
async fn open_and_extract<S>(
    session: &S,
    locator: &str,
    settings: &HarvestSettings,
    logger: &HarvestLogger,
    metrics: &mut HarvestMetrics,
) -> Result<Record, HarvestError>
where
    S: BrowsingSession + ?Sized,
{
    activate_and_await_navigation(
        session,
        locator,
        &settings.deadlines,
        &settings.retry,
        logger,
        metrics,
    )
    .await?;
    await_content_ready(session, &settings.deadlines, logger).await?;
    extract_with_deadline(session, settings.deadlines.extraction).await
}

async fn capture<S>(
    session: &S,
    path: &Path,
    settings: &HarvestSettings,
    logger: &HarvestLogger,
    metrics: &mut HarvestMetrics,
) where
    S: BrowsingSession + ?Sized,
{
    match with_deadline("capture", settings.deadlines.capture, session.capture(path)).await {
        Ok(()) => {
            metrics.record(ItemEvent::CaptureSaved);
            logger.debug(
                format!("capture saved to {}", path.display()),
                Some("capture"),
                None,
            );
        }
        Err(err) => {
            metrics.record(ItemEvent::CaptureFailed);
            logger.warn(
                format!("capture failed: {err}"),
                Some("capture"),
                Some(json!({ "path": path.display().to_string() })),
            );
        }
    }
}

/// Best-effort return to the listing page, waiting for DOM-ready only.
///
/// Failure is logged as [`HarvestError::Recovery`] and otherwise ignored.
pub async fn recover_listing<S>(
    session: &S,
    settings: &HarvestSettings,
    logger: &HarvestLogger,
    metrics: &mut HarvestMetrics,
) where
    S: BrowsingSession + ?Sized,
{
    let url = settings.target_url.as_str();
    let result = with_deadline(
        "recovery",
        settings.deadlines.recovery,
        session.goto(url, WaitUntil::DomContentLoaded),
    )
    .await;

    if let Err(source) = result {
        metrics.record(ItemEvent::RecoveryFailed);
        let err = HarvestError::Recovery {
            url: url.to_string(),
            source: Box::new(source),
        };
        logger.error(err.to_string(), Some("recovery"), None);
    }
}

/// Run one item end to end. Returns `None` when the item failed before a
/// record was extracted; the session has then been pointed back at the
/// listing.
pub async fn process_item<S>(
    session: &S,
    index: usize,
    locator: &str,
    settings: &HarvestSettings,
    logger: &HarvestLogger,
    metrics: &mut HarvestMetrics,
) -> Option<Record>
where
    S: BrowsingSession + ?Sized,
{
    let record = match open_and_extract(session, locator, settings, logger, metrics).await {
        Ok(record) => record,
        Err(err) => {
            metrics.record(ItemEvent::Failed);
            logger.error(
                format!("item {index} failed: {err}"),
                Some("item"),
                Some(json!({ "index": index, "locator": locator, "timeout": err.is_timeout() })),
            );
            recover_listing(session, settings, logger, metrics).await;
            return None;
        }
    };

    if record.is_partial() {
        logger.warn(
            format!("item {index} has no top-level heading"),
            Some("item"),
            Some(json!({ "index": index, "locator": locator })),
        );
    } else if settings.capture.enabled {
        let path = capture_path(&settings.capture, &record.title);
        capture(session, &path, settings, logger, metrics).await;
    }

    let back = with_deadline("back navigation", settings.deadlines.navigation, async {
        tokio::try_join!(session.wait_for_navigation(), session.go_back()).map(|_| ())
    })
    .await;
    if let Err(err) = back {
        logger.warn(
            format!("returning to the listing after item {index} failed: {err}"),
            Some("item"),
            None,
        );
        recover_listing(session, settings, logger, metrics).await;
    }

    metrics.record(ItemEvent::Succeeded);
    logger.info(
        format!("item {index} extracted: {}", record.title),
        Some("item"),
        Some(json!({ "index": index, "sections": record.sections.len() })),
    );
    Some(record)
}
