//! Chromiumoxide-backed [`BrowsingSession`].
//!
//! A [`ChromiumSession`] wraps one tab. Main-frame `Page.frameNavigated` and
//! `Page.navigatedWithinDocument` events feed a [`NavigationWatch`], so a
//! click that loads a new document and one that only pushes history state
//! both satisfy a navigation wait.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventDomContentEventFired, EventFrameNavigated,
    EventNavigatedWithinDocument, GetNavigationHistoryParams, NavigateParams,
    NavigateToHistoryEntryParams,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures_util::{StreamExt, future, stream};

use crate::adapter::navigation::NavigationWatch;
use crate::adapter::network_idle::NetworkIdleTracker;
use crate::dom_scripts::visibility_expression;
use crate::logging::HarvestLogger;
use crate::session::{BrowsingSession, SessionError, WaitUntil};

fn map_page_error(err: impl std::fmt::Display) -> SessionError {
    SessionError::Message(err.to_string())
}

/// Entry id one step back from `current_index`, or an error at the start of
/// history.
fn back_entry_id(current_index: i64, entry_ids: &[i64]) -> Result<i64, SessionError> {
    usize::try_from(current_index - 1)
        .ok()
        .and_then(|index| entry_ids.get(index).copied())
        .ok_or_else(|| {
            SessionError::Message(format!(
                "no history entry before index {current_index} ({} entries)",
                entry_ids.len()
            ))
        })
}

/// Turn a `Page.navigate` error text into a navigation failure.
fn navigate_outcome(url: &str, error_text: Option<&str>) -> Result<(), SessionError> {
    match error_text {
        Some(reason) if !reason.is_empty() => Err(SessionError::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }),
        _ => Ok(()),
    }
}

/// One browser tab driven over CDP.
pub struct ChromiumSession {
    page: Page,
    navigations: NavigationWatch,
    logger: Arc<HarvestLogger>,
}

impl ChromiumSession {
    /// Take ownership of `page` and start watching its main-frame navigations.
    pub async fn attach(page: Page, logger: Arc<HarvestLogger>) -> Result<Self, SessionError> {
        let main_frame = page.mainframe().await.map_err(map_page_error)?;
        let committed = page
            .event_listener::<EventFrameNavigated>()
            .await
            .map_err(map_page_error)?
            .filter_map(|event| future::ready(event.frame.parent_id.is_none().then_some(())));
        let same_document = page
            .event_listener::<EventNavigatedWithinDocument>()
            .await
            .map_err(map_page_error)?
            .filter_map(move |event| {
                let in_main_frame = main_frame.as_ref().is_none_or(|id| *id == event.frame_id);
                future::ready(in_main_frame.then_some(()))
            });
        let navigations = NavigationWatch::spawn(stream::select(committed, same_document));

        Ok(Self {
            page,
            navigations,
            logger,
        })
    }

    /// Stop the navigation watch and close the tab.
    pub async fn close(self) -> Result<(), SessionError> {
        let Self {
            page, navigations, ..
        } = self;
        drop(navigations);
        page.close().await.map_err(map_page_error)
    }

    /// Issue `Page.navigate` and resolve on the new document's
    /// `DOMContentLoaded`, without waiting for subresources.
    async fn navigate_to_dom_ready(&self, url: &str) -> Result<(), SessionError> {
        let mut dom_ready = self
            .page
            .event_listener::<EventDomContentEventFired>()
            .await
            .map_err(map_page_error)?;
        let response = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|err| SessionError::Navigation {
                url: url.to_string(),
                reason: err.to_string(),
            })?;
        navigate_outcome(url, response.result.error_text.as_deref())?;
        dom_ready.next().await.map(|_| ()).ok_or(SessionError::Closed)
    }
}

#[async_trait]
impl BrowsingSession for ChromiumSession {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), SessionError> {
        match wait_until {
            WaitUntil::DomContentLoaded => self.navigate_to_dom_ready(url).await,
            WaitUntil::NetworkIdle => {
                let tracker = NetworkIdleTracker::attach(&self.page).await?;
                self.navigate_to_dom_ready(url).await?;
                tracker.wait_for_quiet(&self.logger).await;
                Ok(())
            }
        }
    }

    async fn wait_for_navigation(&self) -> Result<(), SessionError> {
        self.navigations.next().await
    }

    async fn click(&self, selector: &str) -> Result<(), SessionError> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| SessionError::ElementNotFound(selector.to_string()))?;
        element.click().await.map_err(map_page_error)?;
        Ok(())
    }

    async fn go_back(&self) -> Result<(), SessionError> {
        let history = self
            .page
            .execute(GetNavigationHistoryParams::default())
            .await
            .map_err(map_page_error)?;
        let entry_ids: Vec<i64> = history.result.entries.iter().map(|entry| entry.id).collect();
        let entry_id = back_entry_id(history.result.current_index, &entry_ids)?;
        self.page
            .execute(NavigateToHistoryEntryParams::new(entry_id))
            .await
            .map_err(map_page_error)?;
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, SessionError> {
        let result = self
            .page
            .evaluate(visibility_expression(selector))
            .await
            .map_err(map_page_error)?;
        result.into_value::<bool>().map_err(map_page_error)
    }

    async fn content(&self) -> Result<String, SessionError> {
        self.page.content().await.map_err(map_page_error)
    }

    async fn capture(&self, path: &Path) -> Result<(), SessionError> {
        let capture_error = |reason: String| SessionError::Capture {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| capture_error(err.to_string()))?;
        }

        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(false)
            .build();
        self.page
            .save_screenshot(params, path)
            .await
            .map_err(|err| capture_error(err.to_string()))?;
        Ok(())
    }
}
