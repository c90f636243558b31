//! Analysis workflow
//!
//! `pipeline` is the pure per-image path (file → identity → calibration →
//! segmentation → metrics, no database). `orchestrator` wraps it in a
//! batch run: scanning, timeouts, growth tracking against stored history,
//! and atomic persistence.

pub mod orchestrator;
pub mod pipeline;

pub use orchestrator::{run_batch, BatchSummary};
pub use pipeline::{analyze_image, AnalysisOutput};
