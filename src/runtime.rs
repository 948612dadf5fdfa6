//! Chromiumoxide session provider.
//!
//! The browser is launched lazily on the first [`SessionProvider::acquire`]
//! and shared by every subsequent run; each run gets its own tab. A run that
//! ends in failure marks the browser for restart. It is closed once its last
//! open tab is released, so the next acquire relaunches it without cutting
//! off runs still in flight.

use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::browser::Browser;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::adapter::chromiumoxide::ChromiumSession;
use crate::browser::{BrowserError, LaunchOptions};
use crate::logging::HarvestLogger;
use crate::session::{ReleaseOutcome, SessionError, SessionProvider};

struct RuntimeState {
    browser: Browser,
    handler: JoinHandle<()>,
    tabs: TabLedger,
}

/// Open tabs on the shared browser and whether a failed run asked for a
/// restart.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct TabLedger {
    open: usize,
    restart_pending: bool,
}

impl TabLedger {
    fn opened(&mut self) {
        self.open += 1;
    }

    /// Record a released tab. Returns true when the browser should be
    /// closed now.
    fn released(&mut self, outcome: ReleaseOutcome) -> bool {
        self.open = self.open.saturating_sub(1);
        if outcome == ReleaseOutcome::Failed {
            self.restart_pending = true;
        }
        self.restart_pending && self.open == 0
    }
}

pub struct ChromiumoxideRuntime {
    options: LaunchOptions,
    state: Arc<Mutex<Option<RuntimeState>>>,
    logger: Arc<HarvestLogger>,
}

impl ChromiumoxideRuntime {
    pub fn new(options: LaunchOptions, logger: Arc<HarvestLogger>) -> Self {
        Self {
            options,
            state: Arc::new(Mutex::new(None)),
            logger,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.is_some()
    }

    async fn launch(&self) -> Result<RuntimeState, BrowserError> {
        let config = self.options.browser_config()?;
        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|err| BrowserError::Launch(err.to_string()))?;
        let handler = spawn_handler(handler, Arc::clone(&self.logger));
        self.logger.info(
            format!("browser launched (headless: {})", self.options.headless),
            Some("browser"),
            None,
        );
        Ok(RuntimeState {
            browser,
            handler,
            tabs: TabLedger::default(),
        })
    }

    /// Open a fresh tab, launching the browser first if needed.
    pub async fn new_session(&self) -> Result<ChromiumSession, BrowserError> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.launch().await?);
        }
        let state = guard.as_mut().ok_or_else(|| {
            BrowserError::Message("browser state missing after launch".to_string())
        })?;
        let page = state
            .browser
            .new_page("about:blank")
            .await
            .map_err(map_chromiumoxide_error)?;
        let session = ChromiumSession::attach(page, Arc::clone(&self.logger))
            .await
            .map_err(|err| BrowserError::Message(err.to_string()))?;
        state.tabs.opened();
        Ok(session)
    }

    /// Close the browser if it is running. Safe to call repeatedly.
    pub async fn shutdown(&self) -> Result<(), BrowserError> {
        let state = {
            let mut guard = self.state.lock().await;
            guard.take()
        };

        match state {
            Some(state) => self.close_browser(state).await,
            None => Ok(()),
        }
    }

    async fn close_browser(&self, mut state: RuntimeState) -> Result<(), BrowserError> {
        let closed = state.browser.close().await.map(|_| ());
        if let Err(err) = state.browser.wait().await {
            self.logger.debug(
                format!("browser process did not exit cleanly: {err}"),
                Some("browser"),
                None,
            );
        }
        state.handler.abort();
        closed.map_err(map_chromiumoxide_error)?;
        self.logger.info("browser closed", Some("browser"), None);
        Ok(())
    }
}

#[async_trait]
impl SessionProvider for ChromiumoxideRuntime {
    type Session = ChromiumSession;

    async fn acquire(&self) -> Result<ChromiumSession, SessionError> {
        self.new_session()
            .await
            .map_err(|err| SessionError::Message(err.to_string()))
    }

    async fn release(&self, session: ChromiumSession, outcome: ReleaseOutcome) {
        if let Err(err) = session.close().await {
            self.logger.warn(
                format!("failed to close tab: {err}"),
                Some("browser"),
                None,
            );
        }

        let retired = {
            let mut guard = self.state.lock().await;
            let close_now = match guard.as_mut() {
                Some(state) => {
                    let close_now = state.tabs.released(outcome);
                    if !close_now && state.tabs.restart_pending {
                        self.logger.debug(
                            format!(
                                "browser restart deferred until {} open tab(s) finish",
                                state.tabs.open
                            ),
                            Some("browser"),
                            None,
                        );
                    }
                    close_now
                }
                None => false,
            };
            if close_now { guard.take() } else { None }
        };

        if let Some(state) = retired {
            if let Err(err) = self.close_browser(state).await {
                self.logger.error(
                    format!("failed to shut down browser after failed run: {err}"),
                    Some("browser"),
                    None,
                );
            }
        }
    }
}

fn map_chromiumoxide_error<E: std::fmt::Display>(err: E) -> BrowserError {
    BrowserError::Message(err.to_string())
}

fn spawn_handler(
    mut handler: chromiumoxide::handler::Handler,
    logger: Arc<HarvestLogger>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = handler.next().await {
            if let Err(err) = result {
                logger.debug(
                    format!("chromiumoxide handler error: {err}"),
                    Some("browser"),
                    None,
                );
            }
        }
    })
}
