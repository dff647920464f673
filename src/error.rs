//! Error types for the sheetmark library.
//!
//! Every failure in the pipeline is fatal to the job: there is no partial
//! output, so a single [`SheetmarkError`] type is enough. Its variants carry
//! the context needed to act on the failure (path, tool, exit status, counts).
//!
//! Callers that only care about the *category* of failure use
//! [`SheetmarkError::kind`], which folds the variants onto a small
//! [`ErrorKind`] taxonomy.
//!
//! Two degenerate cases are *not* errors: an individual page
//! image that cannot be identified (dropped with a warning while at least one
//! image remains) and an empty record set (compiles to an empty bookmark file).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// All fatal errors returned by the sheetmark library.
#[derive(Debug, Error)]
pub enum SheetmarkError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// A required input file does not exist.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a usable file path or URL.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── External tools ────────────────────────────────────────────────────
    /// An external executable could not be located or launched.
    #[error("Required tool '{tool}' not found (looked for: {candidates})")]
    ToolNotFound { tool: String, candidates: String },

    /// An external tool exited with a non-zero status.
    #[error("{tool} failed with {}: {stderr}", exit_label(.status))]
    ToolFailed {
        tool: String,
        status: Option<i32>,
        stderr: String,
    },

    /// Ghostscript exited cleanly but its output is unusable.
    #[error("PDF rasterisation produced no usable pages: {detail}")]
    ConversionFailed { detail: String },

    /// PDFtk exited cleanly but did not leave a non-empty output file.
    #[error("Bookmarked PDF '{path}' was not created or is empty")]
    OutputMissing { path: PathBuf },

    /// A bounded operation exceeded its time budget.
    #[error("{operation} timed out after {}s", .limit.as_secs())]
    Timeout { operation: String, limit: Duration },

    // ── Extraction service ────────────────────────────────────────────────
    /// The vision service is not configured (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision service call failed or returned blocked/empty content.
    #[error("Extraction service error: {message}")]
    ServiceError { message: String },

    /// None of the rasterised pages could be read or identified.
    #[error("No usable page images out of {total} (all unreadable or of unknown type)")]
    NoUsableImages { total: usize },

    /// The response text does not contain a parseable JSON object.
    #[error("Could not parse extraction response: {detail}\nResponse starts with: {excerpt:?}")]
    ParseError { detail: String, excerpt: String },

    /// The parsed response breaks the page-count/numbering contract.
    #[error("Extraction response violates the page contract: {detail}")]
    ContractViolation { detail: String },

    // ── Workspace / I/O ───────────────────────────────────────────────────
    /// Creating, writing or moving job files failed.
    #[error("Filesystem error at '{path}': {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse failure category, stable across variant additions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorKind {
    NotFound,
    Timeout,
    ToolFailure,
    ServiceError,
    ParseError,
    ContractViolation,
    Filesystem,
    InvalidInput,
    InvalidConfig,
    Internal,
}

impl SheetmarkError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SheetmarkError::FileNotFound { .. } | SheetmarkError::ToolNotFound { .. } => {
                ErrorKind::NotFound
            }
            SheetmarkError::Timeout { .. } => ErrorKind::Timeout,
            SheetmarkError::ToolFailed { .. }
            | SheetmarkError::ConversionFailed { .. }
            | SheetmarkError::OutputMissing { .. } => ErrorKind::ToolFailure,
            SheetmarkError::ProviderNotConfigured { .. }
            | SheetmarkError::ServiceError { .. }
            | SheetmarkError::NoUsableImages { .. } => ErrorKind::ServiceError,
            SheetmarkError::ParseError { .. } => ErrorKind::ParseError,
            SheetmarkError::ContractViolation { .. } => ErrorKind::ContractViolation,
            SheetmarkError::Filesystem { .. } | SheetmarkError::PermissionDenied { .. } => {
                ErrorKind::Filesystem
            }
            SheetmarkError::InvalidInput { .. }
            | SheetmarkError::NotAPdf { .. }
            | SheetmarkError::DownloadFailed { .. } => ErrorKind::InvalidInput,
            SheetmarkError::InvalidConfig(_) => ErrorKind::InvalidConfig,
            SheetmarkError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SheetmarkError::Filesystem {
            path: path.into(),
            source,
        }
    }
}

fn exit_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (killed by signal)".to_string(),
    }
}
