//! Run orchestration: initial navigation, resolution, and sequential item
//! processing.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;

use crate::error::HarvestError;
use crate::logging::HarvestLogger;
use crate::metrics::HarvestMetrics;
use crate::pipeline::{HarvestSettings, process_item, resolve_items};
use crate::session::{BrowsingSession, SessionProvider, WaitUntil, with_session};
use crate::timing::with_deadline;
use crate::types::HarvestRun;

/// Phases of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Navigating,
    Resolving,
    /// 1-based index of the item in flight.
    Iterating(usize),
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => f.write_str("idle"),
            RunPhase::Navigating => f.write_str("navigating"),
            RunPhase::Resolving => f.write_str("resolving"),
            RunPhase::Iterating(index) => write!(f, "iterating({index})"),
            RunPhase::Done => f.write_str("done"),
            RunPhase::Failed => f.write_str("failed"),
        }
    }
}

struct PhaseTracker<'a> {
    current: RunPhase,
    logger: &'a HarvestLogger,
}

impl<'a> PhaseTracker<'a> {
    fn new(logger: &'a HarvestLogger) -> Self {
        Self {
            current: RunPhase::Idle,
            logger,
        }
    }

    fn enter(&mut self, next: RunPhase) {
        self.logger.debug(
            format!("{} -> {}", self.current, next),
            Some("run"),
            None,
        );
        self.current = next;
    }

    fn fail(&mut self, err: HarvestError) -> HarvestError {
        self.enter(RunPhase::Failed);
        self.logger.error(format!("run failed: {err}"), Some("run"), None);
        err
    }
}

/// Drive one run over an already-acquired session.
///
/// Only the initial navigation and errors outside the item boundary are
/// returned; item failures are logged, counted, and skipped.
pub async fn harvest<S>(
    session: &S,
    settings: &HarvestSettings,
    logger: &HarvestLogger,
) -> Result<HarvestRun, HarvestError>
where
    S: BrowsingSession + ?Sized,
{
    let started = Instant::now();
    let mut metrics = HarvestMetrics::default();
    let mut phase = PhaseTracker::new(logger);
    let url = settings.target_url.as_str();

    phase.enter(RunPhase::Navigating);
    let navigation = with_deadline(
        "initial navigation",
        settings.deadlines.initial_navigation,
        session.goto(url, WaitUntil::NetworkIdle),
    )
    .await;
    if let Err(source) = navigation {
        return Err(phase.fail(HarvestError::InitialNavigation {
            url: url.to_string(),
            source: Box::new(source),
        }));
    }

    phase.enter(RunPhase::Resolving);
    let resolved = match resolve_items(
        session,
        &settings.layout,
        settings.max_items,
        settings.deadlines.resolve,
    )
    .await
    {
        Ok(resolved) => resolved,
        Err(err) => return Err(phase.fail(err)),
    };
    metrics.set_resolved(resolved.locators.len());

    if !resolved.container_found {
        logger.warn(
            format!("listing container '{}' not found", settings.layout.container),
            Some("run"),
            None,
        );
    } else {
        logger.info(
            format!(
                "processing first {} of {} entries",
                resolved.locators.len(),
                resolved.total
            ),
            Some("run"),
            None,
        );
    }

    let mut records = Vec::with_capacity(resolved.locators.len());
    for (offset, locator) in resolved.locators.iter().enumerate() {
        let index = offset + 1;
        phase.enter(RunPhase::Iterating(index));
        if let Some(record) =
            process_item(session, index, locator, settings, logger, &mut metrics).await
        {
            records.push(record);
        }
    }

    phase.enter(RunPhase::Done);
    let elapsed = metrics.finish(started);
    logger.performance(
        "harvest",
        elapsed,
        Some(json!({
            "items_resolved": metrics.items_resolved,
            "items_succeeded": metrics.items_succeeded,
            "items_failed": metrics.items_failed,
            "interaction_retries": metrics.interaction_retries,
            "recoveries_failed": metrics.recoveries_failed,
            "captures_saved": metrics.captures_saved,
            "captures_failed": metrics.captures_failed,
        })),
    );

    Ok(HarvestRun { records, metrics })
}

/// Runs harvests against sessions from a shared provider.
pub struct Harvester<P> {
    provider: Arc<P>,
    settings: HarvestSettings,
    logger: Arc<HarvestLogger>,
}

impl<P> Clone for Harvester<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            settings: self.settings.clone(),
            logger: Arc::clone(&self.logger),
        }
    }
}

impl<P> fmt::Debug for Harvester<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harvester")
            .field("settings", &self.settings)
            .field("logger", &self.logger)
            .finish()
    }
}

impl<P> Harvester<P>
where
    P: SessionProvider,
{
    pub fn new(provider: Arc<P>, settings: HarvestSettings, logger: Arc<HarvestLogger>) -> Self {
        Self {
            provider,
            settings,
            logger,
        }
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    pub fn logger(&self) -> &Arc<HarvestLogger> {
        &self.logger
    }

    /// Acquire a session, run [`harvest`] on it, and release it.
    pub async fn run(&self) -> Result<HarvestRun, HarvestError> {
        let settings = self.settings.clone();
        let logger = Arc::clone(&self.logger);
        self.logger.info(
            format!("starting harvest of {}", settings.target_url),
            Some("run"),
            None,
        );
        with_session(self.provider.as_ref(), move |session| {
            Box::pin(async move { harvest(session, &settings, &logger).await })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogCallback, LogLevel};
    use crate::test_support::FakeSession;
    use std::sync::Mutex;

    const LISTING: &str = r#"<html><body><div class="i1">
        <div class="d4"><a class="dh">One</a></div>
        <div class="d4"><a class="dh">Two</a></div>
    </div>
    <h1>Listing</h1><article><h2>Latest</h2><p>Two posts</p></article>
    </body></html>"#;

    #[tokio::test(start_paused = true)]
    async fn phases_are_logged_in_order() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&messages);
        let callback: LogCallback = Arc::new(move |record| {
            if record.category.as_deref() == Some("run") && record.level == LogLevel::Debug {
                capture.lock().unwrap().push(record.message.clone());
            }
        });
        let mut logger = HarvestLogger::new(LogLevel::Debug);
        logger.set_external_logger(Some(callback));

        let session = FakeSession::with_content(LISTING);
        let run = harvest(
            &session,
            &HarvestSettings::new("https://news.example.com/"),
            &logger,
        )
        .await
        .expect("run");

        assert_eq!(run.records.len(), 2);
        assert_eq!(
            *messages.lock().unwrap(),
            vec![
                "idle -> navigating",
                "navigating -> resolving",
                "resolving -> iterating(1)",
                "iterating(1) -> iterating(2)",
                "iterating(2) -> done",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn initial_navigation_uses_network_idle() {
        let session = FakeSession::with_content(LISTING);
        harvest(
            &session,
            &HarvestSettings::new("https://news.example.com/"),
            &HarvestLogger::new(LogLevel::Error),
        )
        .await
        .expect("run");

        let gotos = session.gotos.lock().unwrap();
        assert_eq!(gotos[0].1, WaitUntil::NetworkIdle);
        assert_eq!(gotos.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn metrics_reflect_the_run() {
        let session = FakeSession::with_content(LISTING);
        let run = harvest(
            &session,
            &HarvestSettings::new("https://news.example.com/"),
            &HarvestLogger::new(LogLevel::Error),
        )
        .await
        .expect("run");

        assert_eq!(run.metrics.items_resolved, 2);
        assert_eq!(run.metrics.items_succeeded, 2);
        assert_eq!(run.metrics.items_failed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_layout_fails_the_run() {
        let session = FakeSession::with_content(LISTING);
        let mut settings = HarvestSettings::new("https://news.example.com/");
        settings.layout.container = "div[".into();

        let err = harvest(&session, &settings, &HarvestLogger::new(LogLevel::Error))
            .await
            .expect_err("bad css");
        assert!(matches!(err, HarvestError::Selector { .. }));
    }
}
