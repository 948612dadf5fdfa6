//! Value types produced by a harvest run.
//!
//! Records and sections are plain data: they are built once by the extractor
//! and never mutated afterwards.

pub mod record;

pub use record::{HarvestRun, Record, RunResult, Section};
