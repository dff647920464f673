//! Outline compiler: page records → PDFtk bookmark text.
//!
//! Output is the `update_info` dump format, one block per record:
//!
//! ```text
//! BookmarkBegin
//! BookmarkTitle: A-101 1st Floor Plan
//! BookmarkLevel: 1
//! BookmarkPageNumber: 2
//!
//! ```
//!
//! Records are emitted in the order given; the extraction adapter has
//! already sorted them by page number.

use crate::error::SheetmarkError;
use crate::model::{BookmarkEntry, PageRecord};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{debug, warn};

/// Render one bookmark block per record.
pub fn compile(records: &[PageRecord]) -> String {
    let mut out = String::new();
    for entry in records.iter().map(BookmarkEntry::from) {
        push_entry(&mut out, &entry);
    }
    out
}

fn push_entry(out: &mut String, entry: &BookmarkEntry) {
    // PDFtk reads the title to end of line.
    let title = entry.title.replace(['\r', '\n'], " ");
    let _ = write!(
        out,
        "BookmarkBegin\nBookmarkTitle: {}\nBookmarkLevel: {}\nBookmarkPageNumber: {}\n\n",
        title, entry.level, entry.target_page
    );
}

/// Compile `records` and write the result to `path` as UTF-8.
pub fn write_bookmark_file(records: &[PageRecord], path: &Path) -> Result<(), SheetmarkError> {
    if records.is_empty() {
        warn!("No page records; writing an empty bookmark file");
    }
    let text = compile(records);
    std::fs::write(path, &text).map_err(|e| SheetmarkError::fs(path, e))?;
    debug!(
        "Wrote {} bookmark(s) to {}",
        records.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MISSING_SHEET_NUMBER, MISSING_SHEET_TITLE};

    fn record(n: usize, number: &str, title: &str) -> PageRecord {
        PageRecord {
            page_number: n,
            sheet_number: number.into(),
            sheet_title: title.into(),
        }
    }

    #[test]
    fn two_records() {
        let text = compile(&[
            record(1, "CS", "Cover Sheet"),
            record(2, "A-101", "1st Floor Plan"),
        ]);
        assert_eq!(
            text,
            "BookmarkBegin\nBookmarkTitle: CS Cover Sheet\nBookmarkLevel: 1\nBookmarkPageNumber: 1\n\n\
             BookmarkBegin\nBookmarkTitle: A-101 1st Floor Plan\nBookmarkLevel: 1\nBookmarkPageNumber: 2\n\n"
        );
    }

    #[test]
    fn empty_input_is_empty_text() {
        assert_eq!(compile(&[]), "");
    }

    #[test]
    fn sentinels_pass_through() {
        let text = compile(&[record(1, MISSING_SHEET_NUMBER, MISSING_SHEET_TITLE)]);
        assert!(text.contains(&format!(
            "BookmarkTitle: {MISSING_SHEET_NUMBER} {MISSING_SHEET_TITLE}\n"
        )));
    }

    #[test]
    fn newlines_in_titles_do_not_break_blocks() {
        let text = compile(&[record(3, "E1", "Power\nPlan")]);
        assert_eq!(text.matches("BookmarkBegin").count(), 1);
        assert!(text.contains("BookmarkTitle: E1 Power Plan\n"));
        assert!(text.contains("BookmarkPageNumber: 3\n"));
    }

    #[test]
    fn block_count_matches_record_count() {
        let records: Vec<PageRecord> = (1..=25).map(|n| record(n, "X", "Sheet")).collect();
        let text = compile(&records);
        assert_eq!(text.matches("BookmarkBegin\n").count(), 25);
        assert!(text.ends_with("BookmarkPageNumber: 25\n\n"));
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc_bookmarks.txt");
        write_bookmark_file(&[record(1, "G-001", "General Notes")], &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("BookmarkBegin\nBookmarkTitle: G-001 General Notes\n"));
    }
}
