//! CLI binary for sheetmark.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `JobConfig` and reports the result.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sheetmark::{
    process_pdf, JobConfig, JobOutput, JobProgressCallback, JobState, ProgressCallback,
    RasterFormat,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the current stage, with one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Resolving input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    /// Remove the spinner line when the job is cut short.
    fn interrupt(&self) {
        self.bar.finish_and_clear();
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_start(&self, input_name: &str) {
        self.bar.set_message(input_name.to_string());
    }

    fn on_stage_start(&self, stage: JobState) {
        self.bar.set_prefix(capitalise(&stage.to_string()));
    }

    fn on_stage_complete(&self, stage: JobState, detail: &str) {
        self.bar.println(format!(
            "  {} {:<12} {}",
            green("✓"),
            capitalise(&stage.to_string()),
            dim(detail)
        ));
    }

    fn on_job_finish(&self, final_state: JobState) {
        self.bar.finish_and_clear();
        if final_state == JobState::Failed {
            eprintln!("{} job failed", red("✘"));
        }
    }
}

fn capitalise(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Bookmark a drawing set (writes ./Autobookmarked_Permit Set.pdf)
  sheetmark "Permit Set.pdf"

  # Write into another directory at higher resolution
  sheetmark -o bookmarked --dpi 150 plans.pdf

  # Use a specific provider and model
  sheetmark --provider openai --model gpt-4.1 plans.pdf

  # Machine-readable result
  sheetmark --json plans.pdf > result.json

REQUIREMENTS:
  Ghostscript  gs (gswin64c / gswin32c on Windows), or --gs PATH
  PDFtk        pdftk, or --pdftk PATH

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (GOOGLE_API_KEY also accepted)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Override log filter (e.g. sheetmark=debug)
"#;

/// Bookmark construction drawing sets by sheet number and title.
#[derive(Parser, Debug)]
#[command(
    name = "sheetmark",
    version,
    about = "Bookmark construction drawing PDFs by sheet number and title",
    long_about = "Rasterise every page of a drawing set, read each sheet's title block with a \
vision LLM, and write a copy of the PDF with one bookmark per sheet.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Directory for the bookmarked PDF and job scratch space.
    #[arg(short, long, env = "SHEETMARK_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// Prefix for the output file name.
    #[arg(long, env = "SHEETMARK_PREFIX", default_value = "Autobookmarked_")]
    prefix: String,

    /// Rasterisation DPI (80–600).
    #[arg(long, env = "SHEETMARK_DPI", default_value_t = 120,
          value_parser = clap::value_parser!(u32).range(80..=600))]
    dpi: u32,

    /// Page image format.
    #[arg(long, env = "SHEETMARK_FORMAT", value_enum, default_value = "png-gray")]
    format: FormatArg,

    /// LLM model ID (e.g. gemini-2.5-pro, gpt-4.1).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Path to the Ghostscript executable.
    #[arg(long = "gs", env = "SHEETMARK_GS")]
    ghostscript: Option<PathBuf>,

    /// Path to the PDFtk executable.
    #[arg(long, env = "SHEETMARK_PDFTK")]
    pdftk: Option<PathBuf>,

    /// Text file with a custom system prompt; must contain {actual_total_pages}.
    #[arg(long, env = "SHEETMARK_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SHEETMARK_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Max LLM output tokens for the extraction reply.
    #[arg(long, env = "SHEETMARK_MAX_TOKENS", default_value_t = 16384)]
    max_tokens: usize,

    /// Keep titles exactly as the model returned them.
    #[arg(long, env = "SHEETMARK_NO_RESANITIZE")]
    no_resanitize: bool,

    /// Ghostscript timeout in seconds.
    #[arg(long, env = "SHEETMARK_RASTERIZE_TIMEOUT", default_value_t = 1200)]
    rasterize_timeout: u64,

    /// Extraction call timeout in seconds.
    #[arg(long, env = "SHEETMARK_EXTRACT_TIMEOUT", default_value_t = 1200)]
    extract_timeout: u64,

    /// PDFtk timeout in seconds.
    #[arg(long, env = "SHEETMARK_APPLY_TIMEOUT", default_value_t = 120)]
    apply_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SHEETMARK_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the job result (path, records, stats) as JSON on stdout.
    #[arg(long, env = "SHEETMARK_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "SHEETMARK_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SHEETMARK_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SHEETMARK_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    PngGray,
    Png16m,
    Jpeg,
    JpegGray,
}

impl From<FormatArg> for RasterFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::PngGray => RasterFormat::PngGray,
            FormatArg::Png16m => RasterFormat::Png16m,
            FormatArg::Jpeg => RasterFormat::Jpeg,
            FormatArg::JpegGray => RasterFormat::JpegGray,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&cli, show_progress).await {
        eprintln!("{} {:#}", red("error:"), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|cb| cb as Arc<dyn JobProgressCallback>);

    let config = build_config(cli, progress_cb).await?;

    // Dropping the job future on Ctrl-C runs the workspace guard's cleanup.
    let output = tokio::select! {
        result = process_pdf(&cli.input, &config) => result.context("Bookmarking failed")?,
        _ = tokio::signal::ctrl_c() => {
            if let Some(ref cb) = spinner {
                cb.interrupt();
            }
            anyhow::bail!("Interrupted; job workspace removed");
        }
    };

    report(cli, &output)
}

fn report(cli: &Cli, output: &JobOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    eprintln!(
        "{}  {} bookmarks  {}ms  →  {}",
        green("✔"),
        output.pages.len(),
        output.stats.total_duration_ms,
        bold(&output.output_path.display().to_string()),
    );
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&output.stats.input_tokens.to_string()),
        dim(&output.stats.output_tokens.to_string()),
    );
    if output.stats.dropped_images > 0 {
        eprintln!(
            "   {} page image(s) could not be sent",
            red(&output.stats.dropped_images.to_string())
        );
    }
    Ok(())
}

/// Map CLI args to `JobConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<JobConfig> {
    let mut builder = JobConfig::builder()
        .output_dir(&cli.output_dir)
        .output_prefix(&cli.prefix)
        .dpi(cli.dpi)
        .raster_format(cli.format.into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .resanitize_titles(!cli.no_resanitize)
        .rasterize_timeout_secs(cli.rasterize_timeout)
        .extract_timeout_secs(cli.extract_timeout)
        .apply_timeout_secs(cli.apply_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.system_prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(template);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref gs) = cli.ghostscript {
        builder = builder.ghostscript_path(gs);
    }
    if let Some(ref pdftk) = cli.pdftk {
        builder = builder.pdftk_path(pdftk);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
