//! # pdf2markdown
//!
//! Convert PDF documents, local or on Google Drive, to Markdown with
//! inferred headings and extracted images.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF path / Drive URL / Drive ID
//!  │
//!  ├─ 1. Input    resolve local file or download from Google Drive
//!  │              (public link, or OAuth for private files)
//!  ├─ 2. Extract  per-page text + images from the best available backend
//!  │              (pdfium → pdf-extract → poppler tools; spawn_blocking)
//!  ├─ 3. Format   heading inference, page separators, image references
//!  └─ 4. Output   verify image links, atomic write of the .md file
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2markdown::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder().output_dir("output_docs").build()?;
//!     let output = convert("input_docs/datasheet.pdf", &config).await?;
//!     eprintln!(
//!         "{} pages, {} images → {}",
//!         output.stats.total_pages,
//!         output.stats.total_images,
//!         output.output_path.display()
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature      | Default | Description |
//! |--------------|---------|-------------|
//! | `cli`        | on      | The `convert-pdf` and `pdf2md-diagrams` binaries (clap + anyhow + tracing-subscriber + indicatif) |
//! | `plain-text` | on      | Pure-Rust text-only backend built on `pdf-extract` |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! pdf2markdown = { version = "0.3", default-features = false, features = ["plain-text"] }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert, convert_sync, inspect_capabilities};
pub use error::{ExtractionError, Pdf2MdError};
pub use output::{
    ConversionOutcome, ConversionOutput, ConversionStats, ImageRecord, PageRecord, SourceInfo,
};
pub use pipeline::extract::{BackendKind, Capabilities, PageExtractor};
pub use pipeline::format::{format_markdown, MarkdownDocument};
pub use pipeline::gdrive::extract_file_id;
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
