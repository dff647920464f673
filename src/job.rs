//! Job entry points.
//!
//! [`process_pdf`] runs one job and returns the precise error on failure.
//! [`run`] is the boundary form: it logs that the job failed and returns
//! `None`, leaving the details to the error logs written where the failure
//! was detected.

use crate::config::JobConfig;
use crate::error::SheetmarkError;
use crate::output::JobOutput;
use crate::pipeline::input;
use crate::pipeline::llm::{LlmVisionService, VisionService};
use crate::pipeline::tool::{find_executable, ghostscript_candidates, pdftk_candidates};
use crate::workflow::{run_workflow, JobTools};
use crate::workspace::{JobWorkspace, WorkspaceGuard};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Model used when Gemini is picked from `GEMINI_API_KEY`/`GOOGLE_API_KEY`.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";

/// Bookmark one PDF (local path or URL).
///
/// # Errors
/// Any stage failure, unchanged. The job workspace has already been removed
/// when this returns, and no final output exists.
pub async fn process_pdf(
    input_str: impl AsRef<str>,
    config: &JobConfig,
) -> Result<JobOutput, SheetmarkError> {
    let input_str = input_str.as_ref();
    info!("Starting job: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(
        input_str,
        Duration::from_secs(config.download_timeout_secs),
    )
    .await?;
    let original_filename = resolved.original_filename();
    ensure_distinct_output(resolved.path(), &original_filename, config)?;

    // ── Step 2: Locate tools and the vision service ──────────────────────
    let ghostscript = find_executable(
        "Ghostscript",
        config.ghostscript_path.as_deref(),
        ghostscript_candidates(),
    )?;
    let pdftk = find_executable("PDFtk", config.pdftk_path.as_deref(), pdftk_candidates())?;
    let service = resolve_vision_service(config)?;

    // ── Step 3: Allocate the workspace ───────────────────────────────────
    let workspace =
        JobWorkspace::allocate(&config.output_dir, &original_filename, &config.output_prefix)?;
    let guard = WorkspaceGuard::new(workspace);

    if let Some(ref cb) = config.progress_callback {
        cb.on_job_start(&original_filename);
    }

    // ── Step 4: Run the stages ───────────────────────────────────────────
    let tools = JobTools {
        ghostscript: &ghostscript,
        pdftk: &pdftk,
        service: service.as_ref(),
    };
    run_workflow(resolved.path(), guard, tools, config).await
}

/// Bookmark one PDF, returning the output path or `None` on failure.
pub async fn run(input_str: impl AsRef<str>, config: &JobConfig) -> Option<PathBuf> {
    let input_str = input_str.as_ref();
    match process_pdf(input_str, config).await {
        Ok(output) => Some(output.output_path),
        Err(e) => {
            error!("Job for '{}' failed ({:?})", input_str, e.kind());
            None
        }
    }
}

/// Synchronous wrapper around [`process_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync(
    input_str: impl AsRef<str>,
    config: &JobConfig,
) -> Result<JobOutput, SheetmarkError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SheetmarkError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_pdf(input_str, config))
}

/// Fail if the final output path names the input file itself.
fn ensure_distinct_output(
    input_pdf: &Path,
    original_filename: &str,
    config: &JobConfig,
) -> Result<(), SheetmarkError> {
    let output = config
        .output_dir
        .join(format!("{}{}", config.output_prefix, original_filename));
    if let (Ok(input), Ok(output)) = (input_pdf.canonicalize(), output.canonicalize()) {
        if input == output {
            error!(
                "Output path {} is the input PDF; refusing to overwrite it",
                output.display()
            );
            return Err(SheetmarkError::InvalidConfig(format!(
                "output '{}' would replace the input PDF; use a non-empty prefix or another output directory",
                output.display()
            )));
        }
    }
    Ok(())
}

// ── Service resolution ───────────────────────────────────────────────────

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, SheetmarkError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SheetmarkError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Pick the vision service, from most-specific to least-specific:
///
/// 1. `config.vision_service` as-is
/// 2. `config.provider` wrapped in [`LlmVisionService`]
/// 3. `config.provider_name` + `config.model`
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set
/// 5. Gemini when `GEMINI_API_KEY` or `GOOGLE_API_KEY` is set
/// 6. `ProviderFactory::from_env`
pub fn resolve_vision_service(
    config: &JobConfig,
) -> Result<Arc<dyn VisionService>, SheetmarkError> {
    if let Some(ref service) = config.vision_service {
        return Ok(Arc::clone(service));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmVisionService::new(provider)))
}

fn resolve_provider(config: &JobConfig) -> Result<Arc<dyn LLMProvider>, SheetmarkError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Some(prov), Some(model)) = (
        non_empty_env("EDGEQUAKE_LLM_PROVIDER"),
        non_empty_env("EDGEQUAKE_MODEL"),
    ) {
        return create_vision_provider(&prov, &model);
    }

    if non_empty_env("GEMINI_API_KEY").is_some() || non_empty_env("GOOGLE_API_KEY").is_some() {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_vision_provider("gemini", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SheetmarkError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY (or GOOGLE_API_KEY), or pass --provider/--model.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::{VisionRequest, VisionResponse};
    use async_trait::async_trait;

    struct Fixed;

    #[async_trait]
    impl VisionService for Fixed {
        async fn complete(&self, _: &VisionRequest) -> Result<VisionResponse, SheetmarkError> {
            Ok(VisionResponse::default())
        }
    }

    #[test]
    fn prebuilt_service_wins() {
        let service: Arc<dyn VisionService> = Arc::new(Fixed);
        let config = JobConfig::builder()
            .vision_service(Arc::clone(&service))
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let resolved = resolve_vision_service(&config).unwrap();
        assert!(Arc::ptr_eq(&resolved, &service));
    }

    #[test]
    fn unknown_named_provider_is_not_configured() {
        let config = JobConfig::builder()
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        let err = resolve_vision_service(&config).err().unwrap();
        assert!(matches!(err, SheetmarkError::ProviderNotConfigured { .. }));
    }

    #[tokio::test]
    async fn output_that_would_replace_input_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("plans.pdf");
        std::fs::write(&input, b"%PDF-1.7\noriginal\n").unwrap();
        let mut config = JobConfig::builder()
            .output_dir(dir.path())
            .vision_service(Arc::new(Fixed))
            .build()
            .unwrap();
        config.output_prefix = String::new();

        let err = process_pdf(input.to_str().unwrap(), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, SheetmarkError::InvalidConfig(_)), "got: {err:?}");
        assert_eq!(std::fs::read(&input).unwrap(), b"%PDF-1.7\noriginal\n");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn prefixed_output_is_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("plans.pdf");
        std::fs::write(&input, b"%PDF-1.7\n").unwrap();
        let config = JobConfig::builder().output_dir(dir.path()).build().unwrap();
        assert!(ensure_distinct_output(&input, "plans.pdf", &config).is_ok());
    }

    #[tokio::test]
    async fn run_returns_none_for_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let config = JobConfig::builder()
            .output_dir(dir.path())
            .vision_service(Arc::new(Fixed))
            .build()
            .unwrap();
        let missing = dir.path().join("missing.pdf");
        assert!(run(missing.to_str().unwrap(), &config).await.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
