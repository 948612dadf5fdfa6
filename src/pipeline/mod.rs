//! The extraction pipeline: listing resolution, per-item interaction,
//! readiness, extraction, and the run orchestrator that drives them.

pub mod extractor;
pub mod interaction;
pub mod item;
pub mod orchestrator;
pub mod readiness;
pub mod resolver;

use std::path::PathBuf;

use crate::config::{DEFAULT_MAX_ITEMS, DEFAULT_SCREENSHOT_PATH, DEFAULT_SCREENSHOT_PREFIX};
use crate::timing::{Deadlines, RetryPolicy};

pub use extractor::{extract_record, extract_with_deadline};
pub use interaction::activate_and_await_navigation;
pub use item::{capture_path, process_item, recover_listing, slugify};
pub use orchestrator::{Harvester, RunPhase, harvest};
pub use readiness::await_content_ready;
pub use resolver::{ResolvedListing, resolve_items, resolve_snapshot};

/// CSS shape of the listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLayout {
    /// Container holding the entries; only the first match is used.
    pub container: String,
    pub entry: String,
    /// Activatable element inside an entry.
    pub target: String,
}

impl Default for ListingLayout {
    fn default() -> Self {
        Self {
            container: "div.i1".to_string(),
            entry: "div.d4".to_string(),
            target: ".dh".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    pub enabled: bool,
    pub directory: PathBuf,
    pub prefix: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            directory: PathBuf::from(DEFAULT_SCREENSHOT_PATH),
            prefix: DEFAULT_SCREENSHOT_PREFIX.to_string(),
        }
    }
}

/// Everything one run needs besides the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    pub target_url: String,
    pub max_items: usize,
    pub layout: ListingLayout,
    pub capture: CaptureSettings,
    pub deadlines: Deadlines,
    pub retry: RetryPolicy,
}

impl HarvestSettings {
    pub fn new(target_url: impl Into<String>) -> Self {
        Self {
            target_url: target_url.into(),
            max_items: DEFAULT_MAX_ITEMS,
            layout: ListingLayout::default(),
            capture: CaptureSettings::default(),
            deadlines: Deadlines::default(),
            retry: RetryPolicy::default(),
        }
    }
}
