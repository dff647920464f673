//! Progress-callback trait for job stage events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::JobConfigBuilder::progress_callback`] to be told when
//! each pipeline stage starts and finishes. The CLI uses it to drive a
//! spinner; an embedding service could forward the events to a websocket.
//!
//! # Example
//!
//! ```rust
//! use sheetmark::{JobConfig, JobProgressCallback, JobState};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl JobProgressCallback for Printer {
//!     fn on_stage_start(&self, stage: JobState) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = JobConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn JobProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::workflow::JobState;
use std::sync::Arc;

/// Observer of a job's stage transitions.
///
/// Stages run strictly one after another, so events for a job never
/// interleave. All methods default to no-ops.
pub trait JobProgressCallback: Send + Sync {
    /// Called once the input is resolved, before any stage runs.
    fn on_job_start(&self, input_name: &str) {
        let _ = input_name;
    }

    /// Called when the job enters `stage`.
    fn on_stage_start(&self, stage: JobState) {
        let _ = stage;
    }

    /// Called when `stage` finishes successfully.
    ///
    /// # Arguments
    /// * `stage`  — the stage that finished
    /// * `detail` — short human-readable summary (e.g. "12 pages")
    fn on_stage_complete(&self, stage: JobState, detail: &str) {
        let _ = (stage, detail);
    }

    /// Called once when the job reaches `Done` or `Failed`.
    fn on_job_finish(&self, final_state: JobState) {
        let _ = final_state;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::JobConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;
