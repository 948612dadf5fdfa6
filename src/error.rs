//! Error taxonomy for harvest runs.
//!
//! Item-level variants (`Interaction`, `ReadinessTimeout`, `ExtractionTimeout`,
//! `Recovery`) are caught at the item boundary and never leave the
//! orchestrator. `InitialNavigation` aborts the run.

use std::time::Duration;

use thiserror::Error;

use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("failed to activate '{locator}' after {attempts} attempts: {source}")]
    Interaction {
        locator: String,
        attempts: u32,
        #[source]
        source: Box<HarvestError>,
    },
    #[error("detail page did not reach extractable structure within {limit:?}")]
    ReadinessTimeout { limit: Duration },
    #[error("extraction did not finish within {limit:?}")]
    ExtractionTimeout { limit: Duration },
    #[error("failed to recover navigation to {url}: {source}")]
    Recovery {
        url: String,
        #[source]
        source: Box<HarvestError>,
    },
    #[error("initial navigation to {url} failed: {source}")]
    InitialNavigation {
        url: String,
        #[source]
        source: Box<HarvestError>,
    },
    #[error("{operation} timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("invalid selector '{selector}': {reason}")]
    Selector { selector: String, reason: String },
}

impl HarvestError {
    /// Whether the failure came from a deadline rather than the browser.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            HarvestError::Timeout { .. }
                | HarvestError::ReadinessTimeout { .. }
                | HarvestError::ExtractionTimeout { .. }
        )
    }

    pub(crate) fn selector(selector: &str, reason: impl std::fmt::Display) -> Self {
        HarvestError::Selector {
            selector: selector.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_variants_are_distinguished_from_session_failures() {
        let limit = Duration::from_secs(10);
        assert!(HarvestError::ReadinessTimeout { limit }.is_timeout());
        assert!(HarvestError::ExtractionTimeout { limit }.is_timeout());
        assert!(
            HarvestError::Timeout {
                operation: "resolve",
                limit
            }
            .is_timeout()
        );
        assert!(!HarvestError::Session(SessionError::Closed).is_timeout());
    }

    #[test]
    fn interaction_error_keeps_source_chain() {
        let err = HarvestError::Interaction {
            locator: ".d4:nth-child(1) > .dh".into(),
            attempts: 3,
            source: Box::new(HarvestError::Session(SessionError::ElementNotFound(
                ".d4:nth-child(1) > .dh".into(),
            ))),
        };
        let message = err.to_string();
        assert!(message.contains("after 3 attempts"));
        let source = std::error::Error::source(&err).expect("source");
        assert!(source.to_string().contains("not found"));
    }
}
