//! Workflow orchestrator: run the stages for one job, in order.
//!
//! ```text
//! Rasterizing ──▶ Extracting ──▶ Compiling ──▶ Applying ──▶ Done
//!      └──────────────┴──────────────┴─────────────┴──────▶ Failed
//! ```
//!
//! The first failing stage ends the job and its error is returned unchanged.
//! The workspace is released exactly once on every path: explicitly at the
//! end of [`run_workflow`], or by [`WorkspaceGuard`]'s `Drop` if the future
//! is dropped mid-stage.

use crate::config::JobConfig;
use crate::error::SheetmarkError;
use crate::output::{JobOutput, JobStats};
use crate::pipeline::extract::{self, ExtractOptions, Extraction};
use crate::pipeline::llm::VisionService;
use crate::pipeline::rasterize::{self, RasterOptions};
use crate::pipeline::{apply, compile};
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use crate::workspace::{JobWorkspace, WorkspaceGuard};
use std::fmt;
use std::path::Path;
use std::time::Instant;
use tracing::{error, info, warn};

/// Where a job is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Rasterizing,
    Extracting,
    Compiling,
    Applying,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Rasterizing => "rasterizing",
            JobState::Extracting => "extracting",
            JobState::Compiling => "compiling",
            JobState::Applying => "applying",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Resolved collaborators for one job.
pub struct JobTools<'a> {
    pub ghostscript: &'a Path,
    pub pdftk: &'a Path,
    pub service: &'a dyn VisionService,
}

/// Run every stage for `input_pdf`, consuming the workspace `guard`.
///
/// Returns the job output only when the bookmarked PDF is in place at
/// `final_output_path`.
pub async fn run_workflow(
    input_pdf: &Path,
    guard: WorkspaceGuard,
    tools: JobTools<'_>,
    config: &JobConfig,
) -> Result<JobOutput, SheetmarkError> {
    let total_start = Instant::now();
    let mut state = JobState::Rasterizing;

    let result = run_stages(input_pdf, guard.paths(), &tools, config, &mut state).await;

    let final_state = match result {
        Ok(_) => JobState::Done,
        Err(ref e) => {
            error!("Job failed while {} ({:?}): {}", state, e.kind(), e);
            JobState::Failed
        }
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_job_finish(final_state);
    }

    guard.release();

    result.map(|mut output| {
        output.stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
        info!(
            "Job complete: {} ({} bookmarks, {}ms)",
            output.output_path.display(),
            output.pages.len(),
            output.stats.total_duration_ms
        );
        output
    })
}

async fn run_stages(
    input_pdf: &Path,
    ws: &JobWorkspace,
    tools: &JobTools<'_>,
    config: &JobConfig,
    state: &mut JobState,
) -> Result<JobOutput, SheetmarkError> {
    let cb = config.progress_callback.as_ref();
    let mut stats = JobStats::default();

    // ── Stage 1: Rasterise ───────────────────────────────────────────────
    enter(cb, state, JobState::Rasterizing);
    let stage_start = Instant::now();
    let raster_options = RasterOptions {
        dpi: config.dpi,
        format: config.raster_format,
        timeout: config.rasterize_timeout(),
    };
    let images =
        rasterize::rasterize(tools.ghostscript, input_pdf, &ws.image_dir, &raster_options).await?;
    stats.total_pages = images.len();
    stats.rasterize_ms = stage_start.elapsed().as_millis() as u64;
    complete(cb, *state, &format!("{} pages", images.len()));

    // ── Stage 2: Extract ─────────────────────────────────────────────────
    enter(cb, state, JobState::Extracting);
    let stage_start = Instant::now();
    let extract_options = ExtractOptions {
        prompt_template: config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: config.extract_timeout(),
        resanitize_titles: config.resanitize_titles,
    };
    let Extraction {
        result,
        raw_json,
        dropped_images,
        input_tokens,
        output_tokens,
    } = extract::extract(tools.service, &images, images.len(), &extract_options).await?;
    stats.dropped_images = dropped_images;
    stats.input_tokens = input_tokens;
    stats.output_tokens = output_tokens;
    stats.extract_ms = stage_start.elapsed().as_millis() as u64;
    save_raw_response(&raw_json, &ws.raw_response_path);
    complete(cb, *state, &format!("{} records", result.pages.len()));

    // ── Stage 3: Compile ─────────────────────────────────────────────────
    enter(cb, state, JobState::Compiling);
    compile::write_bookmark_file(&result.pages, &ws.bookmark_text_path)?;
    complete(cb, *state, &format!("{} bookmarks", result.pages.len()));

    // ── Stage 4: Apply ───────────────────────────────────────────────────
    enter(cb, state, JobState::Applying);
    let stage_start = Instant::now();
    apply::apply(
        tools.pdftk,
        input_pdf,
        &ws.bookmark_text_path,
        &ws.staged_output_path,
        config.apply_timeout(),
    )
    .await?;
    std::fs::rename(&ws.staged_output_path, &ws.final_output_path).map_err(|e| {
        error!(
            "Could not move bookmarked PDF to {}: {}",
            ws.final_output_path.display(),
            e
        );
        SheetmarkError::fs(&ws.final_output_path, e)
    })?;
    stats.apply_ms = stage_start.elapsed().as_millis() as u64;
    complete(cb, *state, &ws.final_output_path.display().to_string());

    *state = JobState::Done;
    Ok(JobOutput {
        output_path: ws.final_output_path.clone(),
        pages: result.pages,
        stats,
    })
}

fn enter(cb: Option<&ProgressCallback>, state: &mut JobState, next: JobState) {
    *state = next;
    info!("Stage: {}", next);
    if let Some(cb) = cb {
        cb.on_stage_start(next);
    }
}

fn complete(cb: Option<&ProgressCallback>, stage: JobState, detail: &str) {
    if let Some(cb) = cb {
        cb.on_stage_complete(stage, detail);
    }
}

/// Keep the located JSON next to the other intermediates, pretty-printed
/// when it parses. Best effort.
fn save_raw_response(raw_json: &str, path: &Path) {
    let text = serde_json::from_str::<serde_json::Value>(raw_json)
        .ok()
        .and_then(|v| serde_json::to_string_pretty(&v).ok())
        .unwrap_or_else(|| raw_json.to_string());
    if let Err(e) = std::fs::write(path, text) {
        warn!("Could not save raw response to {}: {}", path.display(), e);
    }
}
