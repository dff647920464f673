//! Job-scoped scratch directories.
//!
//! Every job gets its own directory under the shared output directory,
//! named from the input's file stem plus a short random token so that two
//! runs over the same file never share intermediates:
//!
//! ```text
//! <output_dir>/
//!   processing_<stem>_<token>/        ← JobWorkspace::root (deleted at job end)
//!     images/page_0001.png …
//!     <stem>_response.json
//!     <stem>_bookmarks.txt
//!     <stem>_staged.pdf
//!   Autobookmarked_<original name>    ← final_output_path (survives)
//! ```
//!
//! [`WorkspaceGuard`] owns the workspace for the job's duration and removes
//! `root` exactly once, either through [`WorkspaceGuard::release`] or in
//! `Drop` when the job future is dropped early (error, panic, Ctrl-C).

use crate::error::SheetmarkError;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Paths for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobWorkspace {
    /// Unique per-job directory; everything below it is temporary.
    pub root: PathBuf,
    /// Where rasterised pages are written.
    pub image_dir: PathBuf,
    /// Copy of the located response JSON, kept for the job's lifetime.
    pub raw_response_path: PathBuf,
    /// Compiled bookmark description file.
    pub bookmark_text_path: PathBuf,
    /// PDFtk output before it is verified and moved into place.
    pub staged_output_path: PathBuf,
    /// Final bookmarked PDF, outside `root`.
    pub final_output_path: PathBuf,
}

impl JobWorkspace {
    /// Create the directories for a new job.
    ///
    /// Ensures `base_dir` exists, then creates `root` and `image_dir`.
    pub fn allocate(
        base_dir: &Path,
        original_filename: &str,
        output_prefix: &str,
    ) -> Result<Self, SheetmarkError> {
        let stem = safe_stem(original_filename);
        let token = uuid::Uuid::new_v4().simple().to_string();
        let root = base_dir.join(format!("processing_{stem}_{}", &token[..8]));

        let workspace = Self {
            image_dir: root.join("images"),
            raw_response_path: root.join(format!("{stem}_response.json")),
            bookmark_text_path: root.join(format!("{stem}_bookmarks.txt")),
            staged_output_path: root.join(format!("{stem}_staged.pdf")),
            final_output_path: base_dir.join(format!("{output_prefix}{original_filename}")),
            root,
        };

        std::fs::create_dir_all(base_dir).map_err(|e| {
            error!("Failed to create output directory {}: {}", base_dir.display(), e);
            SheetmarkError::fs(base_dir, e)
        })?;
        std::fs::create_dir_all(&workspace.image_dir).map_err(|e| {
            error!(
                "Failed to create job workspace {}: {}",
                workspace.root.display(),
                e
            );
            SheetmarkError::fs(&workspace.root, e)
        })?;

        info!("Created job workspace: {}", workspace.root.display());
        Ok(workspace)
    }

    /// Recursively delete `root`. Failures are logged, never returned, so
    /// cleanup cannot mask the error that ended the job.
    pub fn release(&self) {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => info!("Removed job workspace: {}", self.root.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Job workspace already gone: {}", self.root.display())
            }
            Err(e) => error!(
                "Failed to remove job workspace {}: {}",
                self.root.display(),
                e
            ),
        }
    }
}

/// Exclusive owner of a [`JobWorkspace`]; releases it exactly once.
#[derive(Debug)]
pub struct WorkspaceGuard {
    workspace: JobWorkspace,
    released: bool,
}

impl WorkspaceGuard {
    pub fn new(workspace: JobWorkspace) -> Self {
        Self {
            workspace,
            released: false,
        }
    }

    pub fn paths(&self) -> &JobWorkspace {
        &self.workspace
    }

    /// Tear the workspace down now.
    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.workspace.release();
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                "Job ended abnormally, cleaning up {}",
                self.workspace.root.display()
            );
        }
        self.release_once();
    }
}

/// Filename stem made safe for directory names: spaces and dots become `_`,
/// anything outside `[A-Za-z0-9_-]` is dropped.
fn safe_stem(original_filename: &str) -> String {
    let stem = Path::new(original_filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let safe: String = stem
        .chars()
        .filter_map(|c| match c {
            ' ' | '.' => Some('_'),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '-' => Some(c),
            _ => None,
        })
        .collect();

    if safe.is_empty() {
        "document".to_string()
    } else {
        safe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_stem_replaces_spaces_and_dots() {
        assert_eq!(safe_stem("Bid Set v1.2.pdf"), "Bid_Set_v1_2");
        assert_eq!(safe_stem("plans.pdf"), "plans");
        assert_eq!(safe_stem("???.pdf"), "document");
    }

    #[test]
    fn allocate_creates_dirs_and_names_paths() {
        let base = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::allocate(base.path(), "Bid Set.pdf", "Autobookmarked_").unwrap();

        assert!(ws.root.is_dir());
        assert!(ws.image_dir.is_dir());
        assert!(ws.root.starts_with(base.path()));
        assert!(ws
            .root
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("processing_Bid_Set_"));
        assert!(ws.raw_response_path.starts_with(&ws.root));
        assert!(ws.bookmark_text_path.starts_with(&ws.root));
        assert_eq!(
            ws.final_output_path,
            base.path().join("Autobookmarked_Bid Set.pdf")
        );
        assert!(!ws.final_output_path.starts_with(&ws.root));
    }

    #[test]
    fn allocate_creates_missing_base_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let base = tmp.path().join("nested/out");
        let ws = JobWorkspace::allocate(&base, "a.pdf", "X_").unwrap();
        assert!(base.is_dir());
        assert!(ws.image_dir.is_dir());
    }

    #[test]
    fn successive_jobs_get_distinct_roots() {
        let base = tempfile::tempdir().unwrap();
        let a = JobWorkspace::allocate(base.path(), "plans.pdf", "X_").unwrap();
        let b = JobWorkspace::allocate(base.path(), "plans.pdf", "X_").unwrap();
        assert_ne!(a.root, b.root);
        assert_eq!(a.final_output_path, b.final_output_path);
    }

    #[test]
    fn guard_release_removes_root_once() {
        let base = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::allocate(base.path(), "plans.pdf", "X_").unwrap();
        std::fs::write(ws.image_dir.join("page_0001.png"), b"x").unwrap();
        let root = ws.root.clone();

        let guard = WorkspaceGuard::new(ws);
        guard.release();
        assert!(!root.exists());
    }

    #[test]
    fn guard_drop_removes_root() {
        let base = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::allocate(base.path(), "plans.pdf", "X_").unwrap();
        let root = ws.root.clone();
        {
            let _guard = WorkspaceGuard::new(ws);
        }
        assert!(!root.exists());
    }

    #[test]
    fn release_of_missing_root_is_not_fatal() {
        let base = tempfile::tempdir().unwrap();
        let ws = JobWorkspace::allocate(base.path(), "plans.pdf", "X_").unwrap();
        std::fs::remove_dir_all(&ws.root).unwrap();
        ws.release();
    }
}
