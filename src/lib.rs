//! Browser-driven listing harvester.
//!
//! Opens a listing page, visits a bounded number of entries one at a time,
//! and turns each detail page into a [`types::Record`]. Item failures are
//! isolated; only a failed initial navigation aborts a run.

pub mod adapter {
    pub mod chromiumoxide;
    pub mod navigation;
    pub mod network_idle;
}
pub mod browser;
pub mod config;
pub mod document;
pub mod dom_scripts;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod runtime;
pub mod server;
pub mod session;
pub mod timing;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::HarvestError;
pub use pipeline::{Harvester, HarvestSettings, harvest};
pub use session::{BrowsingSession, ReleaseOutcome, SessionError, SessionProvider, WaitUntil};
pub use types::{HarvestRun, Record, RunResult, Section};
