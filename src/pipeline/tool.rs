//! External tool invocation: locate an executable and run it with a deadline.
//!
//! Both Ghostscript and PDFtk are driven the same way: one process per job,
//! output captured, and a hard time budget. The child is spawned with
//! `kill_on_drop`, so when the budget expires (or the job future is dropped)
//! the process is killed instead of being left behind.

use crate::error::SheetmarkError;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Captured output of a successful tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Candidate Ghostscript executable names for this platform.
pub fn ghostscript_candidates() -> &'static [&'static str] {
    if cfg!(windows) {
        &["gswin64c", "gswin32c", "gs"]
    } else {
        &["gs"]
    }
}

/// Candidate PDFtk executable names.
pub fn pdftk_candidates() -> &'static [&'static str] {
    &["pdftk"]
}

/// Resolve `tool` from an explicit path or by searching `PATH`.
pub fn find_executable(
    tool: &str,
    explicit: Option<&Path>,
    candidates: &[&str],
) -> Result<PathBuf, SheetmarkError> {
    if let Some(path) = explicit {
        if path.is_file() {
            info!("{} configured at: {}", tool, path.display());
            return Ok(path.to_path_buf());
        }
        error!("{} not found at configured path {}", tool, path.display());
        return Err(SheetmarkError::ToolNotFound {
            tool: tool.to_string(),
            candidates: path.display().to_string(),
        });
    }

    let search_path = std::env::var_os("PATH").unwrap_or_default();
    for name in candidates {
        for dir in std::env::split_paths(&search_path) {
            for file_name in executable_names(name) {
                let candidate = dir.join(&file_name);
                if is_executable(&candidate) {
                    info!("{} found as '{}' at: {}", tool, name, candidate.display());
                    return Ok(candidate);
                }
            }
        }
    }

    error!("{} not found on PATH (names: {:?})", tool, candidates);
    Err(SheetmarkError::ToolNotFound {
        tool: tool.to_string(),
        candidates: candidates.join(", "),
    })
}

fn executable_names(name: &str) -> Vec<String> {
    if cfg!(windows) {
        vec![format!("{name}.exe"), name.to_string()]
    } else {
        vec![name.to_string()]
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run `program args…` to completion within `limit`.
///
/// # Errors
/// * [`SheetmarkError::ToolNotFound`] — the program could not be spawned
/// * [`SheetmarkError::Timeout`] — `limit` elapsed; the child is killed
/// * [`SheetmarkError::ToolFailed`] — non-zero exit, with stderr attached
pub async fn run_tool<I, S>(
    tool: &str,
    program: &Path,
    args: I,
    limit: Duration,
) -> Result<ToolOutput, SheetmarkError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Running {}: {:?}", tool, command.as_std());

    let child = command.spawn().map_err(|e| {
        error!("Could not launch {} ({}): {}", tool, program.display(), e);
        SheetmarkError::ToolNotFound {
            tool: tool.to_string(),
            candidates: program.display().to_string(),
        }
    })?;

    let output = match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            error!("Waiting for {} failed: {}", tool, e);
            return Err(SheetmarkError::Internal(format!(
                "waiting for {tool} failed: {e}"
            )));
        }
        Err(_) => {
            error!("{} timed out after {}s", tool, limit.as_secs());
            return Err(SheetmarkError::Timeout {
                operation: tool.to_string(),
                limit,
            });
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        error!(
            "{} failed. Exit status: {:?}. Stderr: {}",
            tool,
            output.status.code(),
            stderr.trim()
        );
        return Err(SheetmarkError::ToolFailed {
            tool: tool.to_string(),
            status: output.status.code(),
            stderr: excerpt(&stderr, 2000),
        });
    }

    if !stderr.trim().is_empty() {
        debug!("{} stderr: {}", tool, stderr.trim());
    }
    if !stdout.trim().is_empty() {
        debug!("{} stdout: {}", tool, stdout.trim());
    }

    Ok(ToolOutput { stdout, stderr })
}

/// At most `max_chars` characters of `s`, trimmed.
pub(crate) fn excerpt(s: &str, max_chars: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
