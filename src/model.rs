//! Per-page records and the bookmark entries derived from them.
//!
//! [`PageRecord`] values only come out of the extraction adapter, after the
//! response has passed the page-count contract, so downstream code can rely
//! on page numbers being exactly `1..=N` in ascending order.

use serde::{Deserialize, Serialize};

/// Sentinel used when the service omitted a page's sheet number.
pub const MISSING_SHEET_NUMBER: &str = "MISSING_SHEET_NUM";

/// Sentinel used when the service omitted a page's sheet title.
pub const MISSING_SHEET_TITLE: &str = "MISSING_SHEET_TITLE";

/// One page's title-block facts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-based page number.
    pub page_number: usize,
    /// Drawing identifier such as `A-101` or `M2.0S1`.
    pub sheet_number: String,
    /// Sanitised drawing name such as `3rd Floor Building Plans`.
    pub sheet_title: String,
}

/// A validated extraction response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Page total reported by the service; equals `pages.len()`.
    pub declared_total_pages: usize,
    /// Records sorted by `page_number`, numbered `1..=declared_total_pages`.
    pub pages: Vec<PageRecord>,
}

/// Outline depth written to the bookmark file. The outline is flat.
pub const TOP_LEVEL: u32 = 1;

/// One entry in the PDF outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkEntry {
    pub title: String,
    pub level: u32,
    pub target_page: usize,
}

impl From<&PageRecord> for BookmarkEntry {
    fn from(record: &PageRecord) -> Self {
        let number = non_blank(&record.sheet_number).unwrap_or(MISSING_SHEET_NUMBER);
        let title = non_blank(&record.sheet_title).unwrap_or(MISSING_SHEET_TITLE);
        Self {
            title: format!("{number} {title}"),
            level: TOP_LEVEL,
            target_page: record.page_number,
        }
    }
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
