//! Browsing-session capability and scoped acquisition.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use thiserror::Error;

use crate::error::HarvestError;
use crate::logging::HarvestLogger;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("browser session error: {0}")]
    Message(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("element '{0}' not found")]
    ElementNotFound(String),
    #[error("failed to write capture to {path}: {reason}")]
    Capture { path: PathBuf, reason: String },
    #[error("browser session closed")]
    Closed,
}

/// Load condition for [`BrowsingSession::goto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The new document's `DOMContentLoaded`; images and other subresources
    /// may still be loading.
    DomContentLoaded,
    /// `DOMContentLoaded` followed by a quiet network window.
    NetworkIdle,
}

/// One active browser tab. Operations are invoked sequentially.
#[async_trait]
pub trait BrowsingSession: Send + Sync {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), SessionError>;

    /// Resolve at the next main-frame navigation of the tab: a new document
    /// committing, or a same-document history change.
    ///
    /// Events that fire after the returned future is first polled are
    /// observed, so it can be joined with the action that triggers them.
    async fn wait_for_navigation(&self) -> Result<(), SessionError>;

    async fn click(&self, selector: &str) -> Result<(), SessionError>;

    /// Navigate one entry back in session history. Fails when there is no
    /// earlier entry.
    async fn go_back(&self) -> Result<(), SessionError>;

    /// One-shot probe: the first match exists, is not hidden and has a box.
    async fn is_visible(&self, selector: &str) -> Result<bool, SessionError>;

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, SessionError>;

    /// Write a viewport PNG to `path`, creating parent directories.
    async fn capture(&self, path: &Path) -> Result<(), SessionError>;
}

/// Poll [`BrowsingSession::is_visible`] until it reports true.
///
/// A failed check counts as "not visible yet": while a page is swapping
/// documents the evaluation context can vanish between two checks.
/// Unbounded; callers wrap it in [`crate::timing::with_deadline`].
pub async fn wait_for_visible<S>(
    session: &S,
    selector: &str,
    interval: Duration,
    logger: &HarvestLogger,
) -> Result<(), SessionError>
where
    S: BrowsingSession + ?Sized,
{
    loop {
        match session.is_visible(selector).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(err) => logger.debug(
                format!("visibility check for '{selector}' failed: {err}"),
                Some("visibility"),
                None,
            ),
        }
        tokio::time::sleep(interval).await;
    }
}

/// How a scoped run ended, passed to [`SessionProvider::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Completed,
    Failed,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    type Session: BrowsingSession + 'static;

    async fn acquire(&self) -> Result<Self::Session, SessionError>;

    /// Give a session back. Release problems are the provider's to log.
    async fn release(&self, session: Self::Session, outcome: ReleaseOutcome);
}

/// Acquire a session, run `f` with it, and release it on every exit path.
///
/// A panic inside `f` releases the session as [`ReleaseOutcome::Failed`] and
/// is then resumed.
pub async fn with_session<P, F, T>(provider: &P, f: F) -> Result<T, HarvestError>
where
    P: SessionProvider + ?Sized,
    F: for<'s> FnOnce(&'s P::Session) -> BoxFuture<'s, Result<T, HarvestError>>,
{
    let session = provider.acquire().await?;
    let outcome = AssertUnwindSafe(f(&session)).catch_unwind().await;
    match outcome {
        Ok(result) => {
            let release = if result.is_ok() {
                ReleaseOutcome::Completed
            } else {
                ReleaseOutcome::Failed
            };
            provider.release(session, release).await;
            result
        }
        Err(panic) => {
            provider.release(session, ReleaseOutcome::Failed).await;
            std::panic::resume_unwind(panic)
        }
    }
}
