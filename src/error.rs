//! Error types for the pdf2markdown library.
//!
//! Two error types mirror the two places a conversion can fail:
//!
//! * [`Pdf2MdError`]: **fatal**, the conversion cannot proceed (input not
//!   found, download refused, credentials missing, output not writable).
//!   Returned as `Err(Pdf2MdError)` from the top-level `convert*` functions.
//!
//! * [`ExtractionError`]: raised by a [`crate::pipeline::extract::PageExtractor`]
//!   backend. Always fatal for the run (there is no mid-run fallback to
//!   another backend) and surfaced through [`Pdf2MdError::Extraction`].
//!
//! A backend that yields text but no images is *not* an error: it is a
//! capability gap and shows up only as empty image lists.

use crate::pipeline::extract::BackendKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2markdown library.
#[derive(Debug, Error)]
pub enum Pdf2MdError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// An HTTP(S) URL that is not a Google Drive link.
    #[error("Unsupported URL format. Only Google Drive links are supported. Got: {url}")]
    UnsupportedUrl { url: String },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Download errors ───────────────────────────────────────────────────
    /// Google Drive answered 403 to a download request.
    #[error(
        "Access denied (403) for Google Drive file '{file_id}'. This file requires authentication.\n\
Try again with --auth: convert-pdf {file_id} --auth"
    )]
    AccessDenied { file_id: String },

    /// Any other non-success download status or transport failure.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection and the sharing settings.")]
    DownloadFailed { url: String, reason: String },

    /// Connecting stalled, or no data arrived for the configured time.
    #[error("Download stalled: no data for {secs}s from '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Authentication errors ─────────────────────────────────────────────
    /// Authenticated download requested but the OAuth client secrets file is absent.
    #[error(
        "Credentials file not found: '{path}'\n\
Download the OAuth client secrets (Desktop app) from the Google Cloud Console\n\
and save them as {path:?}, or point --credentials at them."
    )]
    CredentialsMissing { path: PathBuf },

    /// The credentials or token file exists but cannot be used.
    #[error("Invalid OAuth file '{path}': {detail}")]
    InvalidCredentials { path: PathBuf, detail: String },

    /// The OAuth consent flow or token refresh failed.
    #[error("Google authentication failed: {detail}")]
    AuthFailed { detail: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The selected backend could not extract the document.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The Markdown references an image that does not exist on disk.
    #[error("Image referenced as '{reference}' is missing at '{path}'")]
    MissingImage { reference: String, path: PathBuf },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of the page-extraction stage.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The input could not be opened or parsed as a PDF by the backend.
    #[error("PDF '{path}' could not be read by the {backend} backend: {detail}")]
    NotReadable {
        path: PathBuf,
        backend: BackendKind,
        detail: String,
    },

    /// None of the ranked backends is available on this machine.
    #[error(
        "No PDF extraction backend is available.\n\
Install one of:\n\
  • the pdfium shared library (set PDFIUM_LIB_PATH=/path/to/libpdfium)\n\
  • poppler-utils (pdftotext, pdfimages)\n\
or rebuild with the `plain-text` feature.\n\
Run `pdf2md-diagrams --check-deps` to see what was detected."
    )]
    NoBackendAvailable,

    /// A specific backend was requested but is not available.
    #[error("The {0} backend was requested but is not available on this machine")]
    BackendUnavailable(BackendKind),

    /// The backend started but failed mid-document.
    #[error("{backend} extraction failed: {detail}")]
    BackendFailed { backend: BackendKind, detail: String },

    /// An extracted image could not be written to the images directory.
    #[error("Failed to write image '{path}': {source}")]
    ImageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
