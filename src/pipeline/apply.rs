//! Outline application: original PDF + bookmark file → bookmarked PDF.
//!
//! PDFtk's `update_info_utf8` copies the document unchanged and attaches the
//! bookmark blocks as the outline. The UTF-8 variant is used so that titles
//! outside Latin-1 survive; the compiler writes UTF-8.
//!
//! Exit status alone is not trusted: PDFtk has been seen to exit 0 while
//! leaving nothing (or a zero-byte file) behind, so success also requires a
//! non-empty output file. A zero-byte file is never left in place.

use crate::error::SheetmarkError;
use crate::pipeline::tool::run_tool;
use std::ffi::OsString;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info, warn};

/// Write a copy of `original_pdf` with the outline from `bookmark_path` to
/// `output_path`.
///
/// # Errors
/// * [`SheetmarkError::FileNotFound`] — the PDF or the bookmark file is missing
/// * [`SheetmarkError::ToolFailed`] / [`SheetmarkError::Timeout`] — PDFtk failed
/// * [`SheetmarkError::OutputMissing`] — PDFtk reported success without output
pub async fn apply(
    pdftk: &Path,
    original_pdf: &Path,
    bookmark_path: &Path,
    output_path: &Path,
    timeout: Duration,
) -> Result<(), SheetmarkError> {
    for input in [original_pdf, bookmark_path] {
        if !input.exists() {
            error!("Input for outline application not found: {}", input.display());
            return Err(SheetmarkError::FileNotFound {
                path: input.to_path_buf(),
            });
        }
    }

    info!(
        "Applying bookmarks from {} to {}",
        bookmark_path.display(),
        original_pdf.display()
    );

    let args: Vec<OsString> = vec![
        original_pdf.as_os_str().to_owned(),
        "update_info_utf8".into(),
        bookmark_path.as_os_str().to_owned(),
        "output".into(),
        output_path.as_os_str().to_owned(),
    ];

    if let Err(e) = run_tool("PDFtk", pdftk, &args, timeout).await {
        remove_if_empty(output_path);
        return Err(e);
    }

    match std::fs::metadata(output_path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {
            info!(
                "Bookmarked PDF written: {} ({} bytes)",
                output_path.display(),
                meta.len()
            );
            Ok(())
        }
        _ => {
            error!(
                "PDFtk exited successfully but {} is missing or empty",
                output_path.display()
            );
            remove_if_empty(output_path);
            Err(SheetmarkError::OutputMissing {
                path: output_path.to_path_buf(),
            })
        }
    }
}

fn remove_if_empty(path: &Path) {
    if let Ok(meta) = std::fs::metadata(path) {
        if meta.is_file() && meta.len() == 0 {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Could not remove empty output {}: {}", path.display(), e);
            }
        }
    }
}
