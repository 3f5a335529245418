//! Pipeline stages for PDF-to-Markdown conversion.
//!
//! Each submodule implements one step; only [`format`] is pure.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ format ──▶ write
//! (path/Drive) (backend)  (headings)  (atomic)
//! ```
//!
//! 1. [`input`]   : resolve a path, Drive URL or Drive ID to a local PDF,
//!    downloading through [`gdrive`] (and [`oauth`] for private files)
//! 2. [`extract`] : per-page text and images from the best available backend;
//!    runs in `spawn_blocking`
//! 3. [`format`]  : heading inference and image placement
//! 4. [`write`]   : verify image links, then write the Markdown file

pub mod extract;
pub mod format;
pub mod gdrive;
pub mod input;
pub mod oauth;
pub mod write;
