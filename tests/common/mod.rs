//! Scripted in-memory browsing session shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use listing_harvester::logging::{HarvestLogRecord, HarvestLogger, LogCallback, LogLevel};
use listing_harvester::{BrowsingSession, ReleaseOutcome, SessionError, SessionProvider, WaitUntil};
use tokio::sync::Notify;

pub const LISTING_URL: &str = "https://news.example.com/";

#[derive(Debug, Clone, PartialEq)]
enum Location {
    Blank,
    Listing,
    Detail(String),
}

#[derive(Debug, Clone, Default)]
struct DetailPage {
    html: String,
    subsections_hidden: bool,
    content_delay: Option<Duration>,
}

/// One recorded session call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Goto(String, WaitUntil),
    Click(String),
    Back,
    Capture(PathBuf),
}

pub struct ScriptedSession {
    listing_html: String,
    details: HashMap<String, DetailPage>,
    click_failures: Mutex<HashMap<String, u32>>,
    fail_goto: bool,
    location: Mutex<Location>,
    navigated: Notify,
    calls: Mutex<Vec<Call>>,
}

pub fn locator(index: usize) -> String {
    format!("div.i1 > div.d4:nth-child({index}) > .dh")
}

pub fn detail_html(index: usize) -> String {
    format!(
        r#"<html><body><h1>Post {index}</h1>
        <article><h2>Section {index}</h2><p>Body {index}</p><img src="x.png"><p>more</p></article>
        </body></html>"#
    )
}

impl ScriptedSession {
    /// Listing with `entries` entries, each leading to a healthy detail page.
    pub fn listing(entries: usize) -> Self {
        let items: String = (1..=entries)
            .map(|i| format!(r#"<div class="d4"><a class="dh" href="/p/{i}">Post {i}</a></div>"#))
            .collect();
        let listing_html = format!(r#"<html><body><div class="i1">{items}</div></body></html>"#);
        let details = (1..=entries)
            .map(|i| {
                (
                    locator(i),
                    DetailPage {
                        html: detail_html(i),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self::from_parts(listing_html, details)
    }

    /// Listing page without the entry container.
    pub fn without_container() -> Self {
        Self::from_parts(
            "<html><body><main><p>Nothing to see</p></main></body></html>".to_string(),
            HashMap::new(),
        )
    }

    fn from_parts(listing_html: String, details: HashMap<String, DetailPage>) -> Self {
        Self {
            listing_html,
            details,
            click_failures: Mutex::new(HashMap::new()),
            fail_goto: false,
            location: Mutex::new(Location::Blank),
            navigated: Notify::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_goto = true;
        self
    }

    /// Item `index` never shows a subsection heading.
    pub fn with_readiness_stall(mut self, index: usize) -> Self {
        if let Some(page) = self.details.get_mut(&locator(index)) {
            page.subsections_hidden = true;
        }
        self
    }

    /// Snapshotting item `index` takes `delay`.
    pub fn with_content_delay(mut self, index: usize, delay: Duration) -> Self {
        if let Some(page) = self.details.get_mut(&locator(index)) {
            page.content_delay = Some(delay);
        }
        self
    }

    /// The first `failures` clicks on item `index` fail.
    pub fn with_click_failures(self, index: usize, failures: u32) -> Self {
        self.click_failures
            .lock()
            .unwrap()
            .insert(locator(index), failures);
        self
    }

    pub fn with_detail(mut self, index: usize, html: &str) -> Self {
        if let Some(page) = self.details.get_mut(&locator(index)) {
            page.html = html.to_string();
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clicks_on(&self, index: usize) -> usize {
        let target = locator(index);
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Click(sel) if *sel == target))
            .count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn location(&self) -> Location {
        self.location.lock().unwrap().clone()
    }

    fn move_to(&self, location: Location) {
        *self.location.lock().unwrap() = location;
        self.navigated.notify_one();
    }
}

#[async_trait]
impl BrowsingSession for ScriptedSession {
    async fn goto(&self, url: &str, wait_until: WaitUntil) -> Result<(), SessionError> {
        self.record(Call::Goto(url.to_string(), wait_until));
        if self.fail_goto {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        *self.location.lock().unwrap() = Location::Listing;
        Ok(())
    }

    async fn wait_for_navigation(&self) -> Result<(), SessionError> {
        self.navigated.notified().await;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), SessionError> {
        self.record(Call::Click(selector.to_string()));
        if self.location() != Location::Listing || !self.details.contains_key(selector) {
            return Err(SessionError::ElementNotFound(selector.to_string()));
        }
        {
            let mut failures = self.click_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(selector) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(SessionError::Message("element is detached".to_string()));
                }
            }
        }
        self.move_to(Location::Detail(selector.to_string()));
        Ok(())
    }

    async fn go_back(&self) -> Result<(), SessionError> {
        self.record(Call::Back);
        match self.location() {
            Location::Detail(_) => {
                self.move_to(Location::Listing);
                Ok(())
            }
            _ => Err(SessionError::Message("no history entry".to_string())),
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, SessionError> {
        Ok(match self.location() {
            Location::Blank => false,
            Location::Listing => self.details.contains_key(selector),
            Location::Detail(current) => match selector {
                "h1" => true,
                "h2, h3" => self
                    .details
                    .get(&current)
                    .is_some_and(|page| !page.subsections_hidden),
                _ => false,
            },
        })
    }

    async fn content(&self) -> Result<String, SessionError> {
        match self.location() {
            Location::Blank => Ok("<html><body></body></html>".to_string()),
            Location::Listing => Ok(self.listing_html.clone()),
            Location::Detail(current) => {
                let page = self.details.get(&current).cloned().unwrap_or_default();
                if let Some(delay) = page.content_delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(page.html)
            }
        }
    }

    async fn capture(&self, path: &Path) -> Result<(), SessionError> {
        self.record(Call::Capture(path.to_path_buf()));
        Ok(())
    }
}

type Factory = Box<dyn Fn() -> ScriptedSession + Send + Sync>;

/// Provider handing out a fresh scripted session per acquire.
pub struct ScriptedProvider {
    factory: Factory,
    pub releases: Mutex<Vec<ReleaseOutcome>>,
    pub released: Mutex<Vec<ScriptedSession>>,
}

impl ScriptedProvider {
    pub fn new(factory: impl Fn() -> ScriptedSession + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            releases: Mutex::new(Vec::new()),
            released: Mutex::new(Vec::new()),
        }
    }

    pub fn releases(&self) -> Vec<ReleaseOutcome> {
        self.releases.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionProvider for ScriptedProvider {
    type Session = ScriptedSession;

    async fn acquire(&self) -> Result<ScriptedSession, SessionError> {
        Ok((self.factory)())
    }

    async fn release(&self, session: ScriptedSession, outcome: ReleaseOutcome) {
        self.releases.lock().unwrap().push(outcome);
        self.released.lock().unwrap().push(session);
    }
}

/// Logger that keeps every record for inspection.
pub fn capturing_logger() -> (Arc<HarvestLogger>, Arc<Mutex<Vec<HarvestLogRecord>>>) {
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);
    let callback: LogCallback = Arc::new(move |record| {
        sink.lock().unwrap().push(record.clone());
    });
    let mut logger = HarvestLogger::new(LogLevel::Debug);
    logger.set_external_logger(Some(callback));
    (Arc::new(logger), records)
}

pub fn quiet_logger() -> Arc<HarvestLogger> {
    Arc::new(HarvestLogger::new(LogLevel::Error))
}
