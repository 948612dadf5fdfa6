//! Run counters for the harvest pipeline.
//!
//! Per-run accounting of item outcomes and run duration.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Outcome categories tracked while a run iterates over its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemEvent {
    Succeeded,
    Failed,
    InteractionRetry,
    RecoveryFailed,
    CaptureSaved,
    CaptureFailed,
}

/// Aggregated counters for one harvest run.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarvestMetrics {
    pub items_resolved: u64,
    pub items_succeeded: u64,
    pub items_failed: u64,
    pub interaction_retries: u64,
    pub recoveries_failed: u64,
    pub captures_saved: u64,
    pub captures_failed: u64,
    pub elapsed_ms: u64,
}

impl HarvestMetrics {
    /// Count a single item-level event.
    pub fn record(&mut self, event: ItemEvent) {
        match event {
            ItemEvent::Succeeded => self.items_succeeded += 1,
            ItemEvent::Failed => self.items_failed += 1,
            ItemEvent::InteractionRetry => self.interaction_retries += 1,
            ItemEvent::RecoveryFailed => self.recoveries_failed += 1,
            ItemEvent::CaptureSaved => self.captures_saved += 1,
            ItemEvent::CaptureFailed => self.captures_failed += 1,
        }
    }

    pub fn set_resolved(&mut self, count: usize) {
        self.items_resolved = count as u64;
    }

    /// Stamp the run duration and return it.
    pub fn finish(&mut self, started: Instant) -> Duration {
        let elapsed = started.elapsed();
        self.elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        elapsed
    }
}
