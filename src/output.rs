//! Result types returned by a successful job.

use crate::model::PageRecord;
use serde::Serialize;
use std::path::PathBuf;

/// Everything a caller gets back from a successful job.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutput {
    /// The bookmarked PDF.
    pub output_path: PathBuf,
    /// Validated records, one per page, in page order.
    pub pages: Vec<PageRecord>,
    pub stats: JobStats,
}

/// Counters and timings for one job.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobStats {
    /// Pages rasterised (and bookmarked).
    pub total_pages: usize,
    /// Page images that could not be sent to the vision service.
    pub dropped_images: usize,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub rasterize_ms: u64,
    pub extract_ms: u64,
    pub apply_ms: u64,
    pub total_duration_ms: u64,
}
