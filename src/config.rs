//! Configuration for a bookmarking job.
//!
//! Everything a job needs (tool locations, rasterisation settings, model
//! choice, time budgets) lives in one [`JobConfig`] value that is passed
//! explicitly into [`crate::job::run`]. It is built through
//! [`JobConfigBuilder`], which clamps obviously-out-of-range values and
//! validates the rest in [`JobConfigBuilder::build`].

use crate::error::SheetmarkError;
use crate::pipeline::llm::VisionService;
use crate::progress::ProgressCallback;
use crate::prompts::PAGE_COUNT_PLACEHOLDER;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Lowest DPI accepted. Below this, title-block text becomes unreadable to
/// the vision model.
pub const MIN_DPI: u32 = 80;
/// Highest DPI accepted.
pub const MAX_DPI: u32 = 600;

/// Configuration for one bookmarking job.
///
/// # Example
/// ```rust
/// use sheetmark::{JobConfig, RasterFormat};
///
/// let config = JobConfig::builder()
///     .output_dir("/tmp/bookmarked")
///     .dpi(150)
///     .raster_format(RasterFormat::PngGray)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct JobConfig {
    /// Shared output directory. Job workspaces are created inside it and the
    /// final PDF is written to it. Default: current directory.
    pub output_dir: PathBuf,

    /// Prefix prepended to the input filename to name the final PDF.
    /// Default: `Autobookmarked_`.
    pub output_prefix: String,

    /// Ghostscript executable. If None, searched on `PATH`.
    pub ghostscript_path: Option<PathBuf>,

    /// PDFtk executable. If None, searched on `PATH`.
    pub pdftk_path: Option<PathBuf>,

    /// Rasterisation DPI. Range: 80–600. Default: 120.
    ///
    /// Construction sheets are large (ARCH D/E). 120 DPI keeps the title
    /// block legible while a 100-page set still fits in a single request.
    pub dpi: u32,

    /// Ghostscript output device. Default: [`RasterFormat::PngGray`].
    pub raster_format: RasterFormat,

    /// LLM model identifier, e.g. "gemini-2.5-pro", "gpt-4.1".
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "anthropic").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed extraction service. Takes precedence over every
    /// provider setting; used by tests and embedders with their own backend.
    pub vision_service: Option<Arc<dyn VisionService>>,

    /// Sampling temperature. Default: 0.0 (transcription, not creativity).
    pub temperature: f32,

    /// Maximum tokens the model may generate for the whole document.
    /// Default: 16384.
    pub max_tokens: usize,

    /// Custom instruction template. Must contain `{actual_total_pages}`.
    pub system_prompt: Option<String>,

    /// Re-apply title sanitisation to every extracted title. Default: true.
    pub resanitize_titles: bool,

    /// Ghostscript time budget in seconds. Default: 1200.
    pub rasterize_timeout_secs: u64,

    /// Extraction-service time budget in seconds. Default: 1200.
    pub extract_timeout_secs: u64,

    /// PDFtk time budget in seconds. Default: 120.
    pub apply_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional stage-progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            output_prefix: "Autobookmarked_".to_string(),
            ghostscript_path: None,
            pdftk_path: None,
            dpi: 120,
            raster_format: RasterFormat::default(),
            model: None,
            provider_name: None,
            provider: None,
            vision_service: None,
            temperature: 0.0,
            max_tokens: 16384,
            system_prompt: None,
            resanitize_titles: true,
            rasterize_timeout_secs: 1200,
            extract_timeout_secs: 1200,
            apply_timeout_secs: 120,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for JobConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfig")
            .field("output_dir", &self.output_dir)
            .field("output_prefix", &self.output_prefix)
            .field("ghostscript_path", &self.ghostscript_path)
            .field("pdftk_path", &self.pdftk_path)
            .field("dpi", &self.dpi)
            .field("raster_format", &self.raster_format)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "vision_service",
                &self.vision_service.as_ref().map(|_| "<dyn VisionService>"),
            )
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("resanitize_titles", &self.resanitize_titles)
            .field("rasterize_timeout_secs", &self.rasterize_timeout_secs)
            .field("extract_timeout_secs", &self.extract_timeout_secs)
            .field("apply_timeout_secs", &self.apply_timeout_secs)
            .finish()
    }
}

impl JobConfig {
    /// Create a new builder for `JobConfig`.
    pub fn builder() -> JobConfigBuilder {
        JobConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn rasterize_timeout(&self) -> Duration {
        Duration::from_secs(self.rasterize_timeout_secs)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_secs(self.extract_timeout_secs)
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs)
    }
}

/// Builder for [`JobConfig`].
pub struct JobConfigBuilder {
    config: JobConfig,
}

impl fmt::Debug for JobConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl JobConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.output_prefix = prefix.into();
        self
    }

    pub fn ghostscript_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ghostscript_path = Some(path.into());
        self
    }

    pub fn pdftk_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftk_path = Some(path.into());
        self
    }

    /// Set the DPI. Values below 80 are rejected by [`Self::build`] rather
    /// than silently raised.
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.min(MAX_DPI);
        self
    }

    pub fn raster_format(mut self, format: RasterFormat) -> Self {
        self.config.raster_format = format;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn vision_service(mut self, service: Arc<dyn VisionService>) -> Self {
        self.config.vision_service = Some(service);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, template: impl Into<String>) -> Self {
        self.config.system_prompt = Some(template.into());
        self
    }

    pub fn resanitize_titles(mut self, v: bool) -> Self {
        self.config.resanitize_titles = v;
        self
    }

    pub fn rasterize_timeout_secs(mut self, secs: u64) -> Self {
        self.config.rasterize_timeout_secs = secs;
        self
    }

    pub fn extract_timeout_secs(mut self, secs: u64) -> Self {
        self.config.extract_timeout_secs = secs;
        self
    }

    pub fn apply_timeout_secs(mut self, secs: u64) -> Self {
        self.config.apply_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<JobConfig, SheetmarkError> {
        let c = &self.config;
        if c.dpi < MIN_DPI {
            return Err(SheetmarkError::InvalidConfig(format!(
                "DPI must be {MIN_DPI}–{MAX_DPI}, got {} (low resolutions make title blocks unreadable)",
                c.dpi
            )));
        }
        if c.max_tokens == 0 {
            return Err(SheetmarkError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        let timeouts = [
            ("rasterize", c.rasterize_timeout_secs),
            ("extract", c.extract_timeout_secs),
            ("apply", c.apply_timeout_secs),
            ("download", c.download_timeout_secs),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(SheetmarkError::InvalidConfig(format!(
                "{name} timeout must be ≥ 1 second"
            )));
        }
        if c.output_prefix.is_empty() {
            return Err(SheetmarkError::InvalidConfig(
                "output prefix must not be empty (the output would replace the input)".into(),
            ));
        }
        if c.output_prefix.contains(['/', '\\']) {
            return Err(SheetmarkError::InvalidConfig(format!(
                "output prefix '{}' must not contain path separators",
                c.output_prefix
            )));
        }
        if let Some(ref template) = c.system_prompt {
            if !template.contains(PAGE_COUNT_PLACEHOLDER) {
                return Err(SheetmarkError::InvalidConfig(format!(
                    "custom system prompt is missing the {PAGE_COUNT_PLACEHOLDER} placeholder"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Ghostscript output device for rasterised pages.
///
/// Grayscale PNG is the default: title blocks are line work and text, colour
/// adds upload size without helping the model read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RasterFormat {
    /// 8-bit grayscale PNG (default).
    #[default]
    PngGray,
    /// 24-bit colour PNG.
    Png16m,
    /// Colour JPEG.
    Jpeg,
    /// Grayscale JPEG.
    JpegGray,
}

impl RasterFormat {
    /// Ghostscript `-sDEVICE=` value.
    pub fn device(&self) -> &'static str {
        match self {
            RasterFormat::PngGray => "pnggray",
            RasterFormat::Png16m => "png16m",
            RasterFormat::Jpeg => "jpeg",
            RasterFormat::JpegGray => "jpeggray",
        }
    }

    /// File extension Ghostscript output is written with.
    pub fn extension(&self) -> &'static str {
        match self {
            RasterFormat::PngGray | RasterFormat::Png16m => "png",
            RasterFormat::Jpeg | RasterFormat::JpegGray => "jpg",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = JobConfig::builder().build().expect("defaults build");
        assert_eq!(config.dpi, 120);
        assert_eq!(config.raster_format, RasterFormat::PngGray);
        assert_eq!(config.output_prefix, "Autobookmarked_");
        assert_eq!(config.temperature, 0.0);
        assert!(config.resanitize_titles);
        assert_eq!(config.apply_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn low_dpi_rejected() {
        let err = JobConfig::builder().dpi(72).build().unwrap_err();
        assert!(err.to_string().contains("DPI"), "got: {err}");
    }

    #[test]
    fn high_dpi_clamped() {
        let config = JobConfig::builder().dpi(2000).build().unwrap();
        assert_eq!(config.dpi, MAX_DPI);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = JobConfig::builder().apply_timeout_secs(0).build().unwrap_err();
        assert!(err.to_string().contains("apply"), "got: {err}");
    }

    #[test]
    fn prompt_without_placeholder_rejected() {
        let err = JobConfig::builder()
            .system_prompt("Read the title blocks.")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("placeholder"), "got: {err}");
    }

    #[test]
    fn empty_prefix_rejected() {
        let err = JobConfig::builder().output_prefix("").build().unwrap_err();
        assert!(err.to_string().contains("prefix"), "got: {err}");
    }

    #[test]
    fn prefix_with_separator_rejected() {
        assert!(JobConfig::builder().output_prefix("a/b_").build().is_err());
    }

    #[test]
    fn raster_format_devices() {
        assert_eq!(RasterFormat::PngGray.device(), "pnggray");
        assert_eq!(RasterFormat::PngGray.extension(), "png");
        assert_eq!(RasterFormat::JpegGray.device(), "jpeggray");
        assert_eq!(RasterFormat::Jpeg.extension(), "jpg");
    }
}
