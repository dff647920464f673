//! # sheetmark
//!
//! Add a sheet-by-sheet bookmark outline to construction drawing sets.
//!
//! ## Why this crate?
//!
//! A permit or bid set is hundreds of pages of sheets whose only index is
//! the title block in each sheet's corner. Text extraction is useless on
//! scanned or vector-only sheets, so this crate rasterises every page and
//! asks a vision model to read the title blocks, then writes one bookmark
//! per page (`A-101 1st Floor Plan`) into a copy of the PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Rasterize  Ghostscript, one image per page
//!  ├─ 3. Extract    one vision request for the whole set, strict JSON contract
//!  ├─ 4. Compile    page records → PDFtk bookmark text
//!  └─ 5. Apply      PDFtk update_info_utf8 → Autobookmarked_<name>.pdf
//! ```
//!
//! A job either produces a fully bookmarked PDF or nothing: any stage
//! failure ends it, and its scratch directory is removed either way.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sheetmark::{process_pdf, JobConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Gemini picked up from GEMINI_API_KEY / GOOGLE_API_KEY
//!     let config = JobConfig::builder().output_dir("bookmarked").build()?;
//!     let output = process_pdf("Permit Set.pdf", &config).await?;
//!     println!("{}", output.output_path.display());
//!     for page in &output.pages {
//!         println!("{:>4}  {} {}", page.page_number, page.sheet_number, page.sheet_title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! Ghostscript (`gs`, `gswin64c` on Windows) and PDFtk (`pdftk`) must be on
//! `PATH` or configured with [`JobConfigBuilder::ghostscript_path`] and
//! [`JobConfigBuilder::pdftk_path`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sheetmark` binary (clap + anyhow + indicatif + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod job;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod sanitize;
pub mod workflow;
pub mod workspace;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{JobConfig, JobConfigBuilder, RasterFormat};
pub use error::{ErrorKind, SheetmarkError};
pub use job::{process_pdf, resolve_vision_service, run, run_sync};
pub use model::{BookmarkEntry, ExtractionResult, PageRecord};
pub use output::{JobOutput, JobStats};
pub use pipeline::llm::{LlmVisionService, VisionRequest, VisionResponse, VisionService};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use sanitize::sanitize_title;
pub use workflow::JobState;
pub use workspace::{JobWorkspace, WorkspaceGuard};
