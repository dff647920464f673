//! Input resolution: normalise a user-supplied path or URL to a local PDF.
//!
//! Ghostscript and PDFtk both need a file-system path. A URL is downloaded
//! into a `TempDir` that lives as long as the [`ResolvedInput`], so the copy
//! is removed when the job is done with it, whichever way it ends. The
//! `%PDF` magic bytes are checked up front so a bad input fails with a clear
//! error instead of a Ghostscript stack dump.

use crate::error::SheetmarkError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input: either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the PDF lives in `_temp_dir` until this is dropped.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the PDF regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// File name used to name the workspace and the final output.
    pub fn original_filename(&self) -> String {
        self.path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string())
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file.
pub async fn resolve_input(
    input: &str,
    download_timeout: Duration,
) -> Result<ResolvedInput, SheetmarkError> {
    if input.trim().is_empty() {
        return Err(SheetmarkError::InvalidInput {
            input: input.to_string(),
            reason: "empty path".into(),
        });
    }
    if is_url(input) {
        download_url(input, download_timeout).await
    } else {
        resolve_local(input)
    }
}

fn resolve_local(path_str: &str) -> Result<ResolvedInput, SheetmarkError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(SheetmarkError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(SheetmarkError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(SheetmarkError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(SheetmarkError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

async fn download_url(url: &str, timeout: Duration) -> Result<ResolvedInput, SheetmarkError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| SheetmarkError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            SheetmarkError::Timeout {
                operation: format!("Download of {url}"),
                limit: timeout,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let filename = filename_from_url(url);
    let temp_dir = TempDir::new().map_err(|e| SheetmarkError::fs(std::env::temp_dir(), e))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(SheetmarkError::NotAPdf {
            path: file_path,
            magic,
        });
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| SheetmarkError::fs(&file_path, e))?;

    info!("Downloaded {} bytes to: {}", bytes.len(), file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Percent-decoded last path segment of `url` if it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                let decoded = urlencoding::decode(last)
                    .map(|name| name.into_owned())
                    .unwrap_or_else(|_| last.to_string());
                // `%2F` decodes to a separator; the name must stay one component.
                let name = decoded.replace(['/', '\\'], "_");
                if !name.trim().is_empty() && name.contains('.') {
                    return name;
                }
            }
        }
    }
    "downloaded.pdf".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(
            filename_from_url("https://example.com/sets/Permit%20Set.pdf?x=1"),
            "Permit Set.pdf"
        );
        assert_eq!(
            filename_from_url("https://example.com/a%2Fb%20c.pdf"),
            "a_b c.pdf"
        );
        assert_eq!(
            filename_from_url("https://example.com/Bad%FF.pdf"),
            "Bad%FF.pdf"
        );
        assert_eq!(filename_from_url("https://example.com/download"), "downloaded.pdf");
    }

    #[tokio::test]
    async fn local_pdf_resolves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Permit Set.pdf");
        std::fs::write(&path, b"%PDF-1.7\n%%EOF\n").unwrap();

        let resolved = resolve_input(path.to_str().unwrap(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(resolved.path(), path);
        assert_eq!(resolved.original_filename(), "Permit Set.pdf");
    }

    #[tokio::test]
    async fn non_pdf_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"hello world").unwrap();

        let err = resolve_input(path.to_str().unwrap(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetmarkError::NotAPdf { magic, .. } if &magic == b"hell"));
    }

    #[tokio::test]
    async fn missing_file_and_empty_input() {
        let err = resolve_input("/no/such/set.pdf", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SheetmarkError::FileNotFound { .. }));

        let err = resolve_input("  ", Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, SheetmarkError::InvalidInput { .. }));
    }
}
