//! In-memory session used by unit tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::session::{BrowsingSession, SessionError, WaitUntil};

#[derive(Default)]
pub(crate) struct FakeSession {
    pub content: Mutex<String>,
    /// Selectors that never become visible.
    pub hidden: Mutex<HashSet<String>>,
    /// Number of leading visibility checks that fail.
    pub failing_visibility: AtomicU32,
    /// Number of leading clicks that fail.
    pub failing_clicks: AtomicU32,
    /// Clicks succeed but never navigate.
    pub stall_navigation: bool,
    pub fail_go_back: bool,
    pub fail_goto: bool,
    pub fail_capture: bool,
    pub clicks: AtomicU32,
    pub backs: AtomicU32,
    pub gotos: Mutex<Vec<(String, WaitUntil)>>,
    pub captures: Mutex<Vec<PathBuf>>,
    pub navigated: Notify,
}

impl FakeSession {
    pub fn with_content(html: &str) -> Self {
        let session = Self::default();
        *session.content.lock().unwrap() = html.to_string();
        session
    }

    pub fn hide(&self, selector: &str) {
        self.hidden.lock().unwrap().insert(selector.to_string());
    }

    pub fn fail_visibility_checks(&self, count: u32) {
        self.failing_visibility.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl BrowsingSession for FakeSession {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), SessionError> {
        self.gotos.lock().unwrap().push((url.to_string(), wait_until));
        if self.fail_goto {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_CONNECTION_REFUSED".to_string(),
            });
        }
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), SessionError> {
        self.navigated.notified().await;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), SessionError> {
        self.clicks.fetch_add(1, Ordering::SeqCst);
        let failing = self.failing_clicks.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_clicks.store(failing - 1, Ordering::SeqCst);
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        if !self.stall_navigation {
            self.navigated.notify_one();
        }
        Ok(())
    }

    async fn go_back(&self) -> Result<(), SessionError> {
        self.backs.fetch_add(1, Ordering::SeqCst);
        if self.fail_go_back {
            return Err(SessionError::Message("history is empty".to_string()));
        }
        self.navigated.notify_one();
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, SessionError> {
        let failing = self.failing_visibility.load(Ordering::SeqCst);
        if failing > 0 {
            self.failing_visibility.store(failing - 1, Ordering::SeqCst);
            return Err(SessionError::Message(
                "Execution context was destroyed".to_string(),
            ));
        }
        Ok(!self.hidden.lock().unwrap().contains(selector))
    }

    async fn content(&self) -> Result<String, SessionError> {
        Ok(self.content.lock().unwrap().clone())
    }

    async fn capture(&self, path: &Path) -> Result<(), SessionError> {
        if self.fail_capture {
            return Err(SessionError::Capture {
                path: path.to_path_buf(),
                reason: "disk full".to_string(),
            });
        }
        self.captures.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}
