//! Pipeline stages for bookmarking a drawing set.
//!
//! Each submodule implements one transformation step and is testable on its
//! own; [`crate::workflow`] strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ rasterize ──▶ extract ──▶ compile ──▶ apply
//! (URL/path) (Ghostscript) (vision)   (outline)   (PDFtk)
//!                            │
//!                     encode + llm
//! ```
//!
//! 1. [`input`]     — canonicalise the user-supplied path or URL to a local PDF
//! 2. [`rasterize`] — one image per page, collected in numeric page order
//! 3. [`extract`]   — one vision request for the whole set, parsed and held
//!    to the page contract; uses [`encode`] and the [`llm`] seam
//! 4. [`compile`]   — page records to PDFtk bookmark text
//! 5. [`apply`]     — attach the outline and verify the output file
//!
//! [`tool`] holds the executable lookup and timed process runner shared by
//! the two external-tool stages.

pub mod apply;
pub mod compile;
pub mod encode;
pub mod extract;
pub mod input;
pub mod llm;
pub mod rasterize;
pub mod tool;
