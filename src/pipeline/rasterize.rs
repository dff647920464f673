//! PDF rasterisation: one image per page via Ghostscript.
//!
//! Ghostscript writes `page_0001.png`, `page_0002.png`, … into the job's
//! image directory. Collecting them back is where page order can silently
//! break: a lexical sort puts `page_10000` before `page_2000` once the
//! zero-padding overflows, and a directory listing has no order at all.
//! Files are therefore sorted by the *parsed* page index, and the indices
//! must form exactly `1..=N`.

use crate::config::RasterFormat;
use crate::error::SheetmarkError;
use crate::pipeline::tool::run_tool;
use once_cell::sync::Lazy;
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

static RE_PAGE_IMAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page_(\d+)\.([A-Za-z0-9]+)$").unwrap());

/// Ghostscript invocation settings.
#[derive(Debug, Clone)]
pub struct RasterOptions {
    pub dpi: u32,
    pub format: RasterFormat,
    pub timeout: Duration,
}

/// Rasterise every page of `pdf_path` into `image_dir`.
///
/// # Returns
/// Image paths where element `k` is page `k + 1`.
///
/// # Errors
/// * [`SheetmarkError::FileNotFound`] — `pdf_path` does not exist
/// * [`SheetmarkError::ToolFailed`] / [`SheetmarkError::Timeout`] — Ghostscript failed
/// * [`SheetmarkError::ConversionFailed`] — no page images, or a gap in the numbering
pub async fn rasterize(
    ghostscript: &Path,
    pdf_path: &Path,
    image_dir: &Path,
    options: &RasterOptions,
) -> Result<Vec<PathBuf>, SheetmarkError> {
    if !pdf_path.exists() {
        error!("Input PDF not found at: {}", pdf_path.display());
        return Err(SheetmarkError::FileNotFound {
            path: pdf_path.to_path_buf(),
        });
    }

    info!(
        "Rasterising {} at {} DPI ({})",
        pdf_path.display(),
        options.dpi,
        options.format.device()
    );

    let ext = options.format.extension();
    let mut output_file = OsString::from("-sOutputFile=");
    output_file.push(image_dir.join(format!("page_%04d.{ext}")));

    let args: Vec<OsString> = vec![
        "-dNOPAUSE".into(),
        "-dBATCH".into(),
        "-dSAFER".into(),
        "-q".into(),
        format!("-sDEVICE={}", options.format.device()).into(),
        format!("-r{}", options.dpi).into(),
        output_file,
        pdf_path.as_os_str().to_owned(),
    ];

    run_tool("Ghostscript", ghostscript, &args, options.timeout).await?;

    let images = collect_page_images(image_dir, ext)?;
    info!("Found and sorted {} page image(s)", images.len());
    Ok(images)
}

/// List `page_<N>.<ext>` files in `dir`, ordered by `N`.
///
/// Fails if there are none or if the indices are not exactly `1..=count`.
pub fn collect_page_images(dir: &Path, ext: &str) -> Result<Vec<PathBuf>, SheetmarkError> {
    let entries = std::fs::read_dir(dir).map_err(|e| SheetmarkError::fs(dir, e))?;

    let mut pages: Vec<(usize, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SheetmarkError::fs(dir, e))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(caps) = RE_PAGE_IMAGE.captures(name) else {
            continue;
        };
        if !caps[2].eq_ignore_ascii_case(ext) {
            continue;
        }
        if let Ok(index) = caps[1].parse::<usize>() {
            pages.push((index, entry.path()));
        }
    }

    if pages.is_empty() {
        error!(
            "Ghostscript ran but produced no page_*.{} files in {}",
            ext,
            dir.display()
        );
        return Err(SheetmarkError::ConversionFailed {
            detail: format!("no page_*.{ext} images in {}", dir.display()),
        });
    }

    pages.sort_by_key(|(index, _)| *index);

    for (expected, (index, path)) in (1..).zip(&pages) {
        if *index != expected {
            error!(
                "Page image numbering broken at {}: expected page {}",
                path.display(),
                expected
            );
            return Err(SheetmarkError::ConversionFailed {
                detail: format!(
                    "page images are not numbered 1..{}: found index {index} where {expected} was expected",
                    pages.len()
                ),
            });
        }
    }

    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"img").unwrap();
    }

    fn names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn sorts_numerically_not_lexically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page_10.png", "page_2.png", "page_1.png", "page_3.png"] {
            touch(dir.path(), name);
        }
        for i in 4..=9 {
            touch(dir.path(), &format!("page_{i}.png"));
        }
        let images = collect_page_images(dir.path(), "png").unwrap();
        let got = names(&images);
        assert_eq!(got.len(), 10);
        assert_eq!(got[0], "page_1.png");
        assert_eq!(got[1], "page_2.png");
        assert_eq!(got[9], "page_10.png");
    }

    #[test]
    fn handles_padding_overflow_past_9999() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=10_001 {
            touch(dir.path(), &format!("page_{i:04}.png"));
        }
        let images = collect_page_images(dir.path(), "png").unwrap();
        assert_eq!(images.len(), 10_001);
        let got = names(&images);
        assert_eq!(got[9_998], "page_9999.png");
        assert_eq!(got[9_999], "page_10000.png");
        assert_eq!(got[10_000], "page_10001.png");
    }

    #[test]
    fn single_page() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "page_0001.png");
        assert_eq!(collect_page_images(dir.path(), "png").unwrap().len(), 1);
    }

    #[test]
    fn ignores_other_files_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "page_0001.png");
        touch(dir.path(), "page_0002.png");
        touch(dir.path(), "page_0003.jpg");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "page_x.png");
        let images = collect_page_images(dir.path(), "png").unwrap();
        assert_eq!(names(&images), vec!["page_0001.png", "page_0002.png"]);
    }

    #[test]
    fn empty_output_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "other.png");
        let err = collect_page_images(dir.path(), "png").unwrap_err();
        assert!(matches!(err, SheetmarkError::ConversionFailed { .. }));
    }

    #[test]
    fn gap_in_numbering_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "page_0001.png");
        touch(dir.path(), "page_0003.png");
        let err = collect_page_images(dir.path(), "png").unwrap_err();
        assert!(err.to_string().contains("expected"), "got: {err}");
    }

    #[tokio::test]
    async fn missing_pdf_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let options = RasterOptions {
            dpi: 120,
            format: RasterFormat::PngGray,
            timeout: Duration::from_secs(5),
        };
        let err = rasterize(
            Path::new("gs"),
            &dir.path().join("missing.pdf"),
            dir.path(),
            &options,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SheetmarkError::FileNotFound { .. }));
    }
}
