// src/pipeline/mod.rs

//! Pipeline orchestration.
//!
//! Wires the page stream, the enrichment scheduler, and the checkpoint
//! store into one resumable run.

mod progress;
mod run;
mod summary;

pub use progress::PageTracker;
pub use run::{CollectionPipeline, PipelineReport, RunOptions};
pub use summary::RunSummary;
