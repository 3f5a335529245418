//! Page extraction: local PDF → ordered [`PageRecord`]s with images on disk.
//!
//! Three backends are ranked by how much they can recover:
//!
//! | Rank | Backend      | Text | Images | Requires                          |
//! |------|--------------|------|--------|-----------------------------------|
//! | 1    | `pdfium`     | ✓    | ✓      | pdfium shared library             |
//! | 2    | `plain-text` | ✓    | ✗      | `plain-text` cargo feature        |
//! | 3    | `poppler`    | ✓    | ✓*     | `pdftotext` (*`pdfimages` too)    |
//!
//! Availability is probed once into a [`Capabilities`] value, which the
//! caller threads through [`crate::config::ConversionConfig`]. The first
//! available backend is used for the whole run; a failure is fatal and never
//! falls through to the next rank. A backend that cannot extract images
//! returns empty image lists, which is a successful result.

mod pdfium;
#[cfg(feature = "plain-text")]
mod plain_text;
mod poppler;

pub use pdfium::{PdfiumExtractor, PdfiumLibrary};
#[cfg(feature = "plain-text")]
pub use plain_text::PlainTextExtractor;
pub use poppler::{PopplerExtractor, SystemTools};

use crate::error::{ExtractionError, Pdf2MdError};
use crate::output::PageRecord;
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Identifies an extraction backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Pdfium,
    PlainText,
    Poppler,
}

impl BackendKind {
    /// All backends in priority order.
    pub const RANKED: [BackendKind; 3] = [
        BackendKind::Pdfium,
        BackendKind::PlainText,
        BackendKind::Poppler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Pdfium => "pdfium",
            BackendKind::PlainText => "plain-text",
            BackendKind::Poppler => "poppler",
        }
    }

    /// Whether the backend can recover embedded images at all.
    pub fn extracts_images(&self) -> bool {
        !matches!(self, BackendKind::PlainText)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pdfium" => Ok(BackendKind::Pdfium),
            "plain-text" | "plaintext" | "pdf-extract" => Ok(BackendKind::PlainText),
            "poppler" | "pdftotext" => Ok(BackendKind::Poppler),
            other => Err(format!(
                "unknown backend '{other}' (expected pdfium, plain-text or poppler)"
            )),
        }
    }
}

/// Availability report for one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendCapability {
    pub kind: BackendKind,
    pub available: bool,
    /// Where the backend was found, or why it is missing.
    pub detail: String,
}

/// Ranked backend availability, probed once per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// One entry per backend, in priority order.
    pub backends: Vec<BackendCapability>,
    /// Poppler command-line tools found on `PATH`.
    pub tools: SystemTools,
    #[serde(skip)]
    pdfium_library: Option<PdfiumLibrary>,
}

impl Capabilities {
    /// Probe the machine for every backend.
    pub fn probe() -> Self {
        let pdfium_library = PdfiumLibrary::locate();
        let tools = SystemTools::probe();
        let caps = Self::from_parts(pdfium_library, cfg!(feature = "plain-text"), tools);
        for b in &caps.backends {
            debug!("backend {}: available={} ({})", b.kind, b.available, b.detail);
        }
        caps
    }

    /// Assemble a capability set from already-known facts.
    pub fn from_parts(
        pdfium_library: Option<PdfiumLibrary>,
        plain_text: bool,
        tools: SystemTools,
    ) -> Self {
        let pdfium = BackendCapability {
            kind: BackendKind::Pdfium,
            available: pdfium_library.is_some(),
            detail: pdfium_library
                .as_ref()
                .map(|l| l.to_string())
                .unwrap_or_else(|| "pdfium shared library not found".into()),
        };
        let plain = BackendCapability {
            kind: BackendKind::PlainText,
            available: plain_text,
            detail: if plain_text {
                "built in (pdf-extract, text only)".into()
            } else {
                "disabled at build time (feature `plain-text`)".into()
            },
        };
        let poppler = BackendCapability {
            kind: BackendKind::Poppler,
            available: tools.pdftotext,
            detail: match (tools.pdftotext, tools.pdfimages) {
                (true, true) => "pdftotext + pdfimages".into(),
                (true, false) => "pdftotext only (no images)".into(),
                _ => "pdftotext not found on PATH".into(),
            },
        };
        Self {
            backends: vec![pdfium, plain, poppler],
            tools,
            pdfium_library,
        }
    }

    /// A capability set with nothing available.
    pub fn none() -> Self {
        Self::from_parts(None, false, SystemTools::default())
    }

    pub fn is_available(&self, kind: BackendKind) -> bool {
        self.backends.iter().any(|b| b.kind == kind && b.available)
    }

    /// Highest-ranked available backend.
    pub fn first_available(&self) -> Option<BackendKind> {
        self.backends.iter().find(|b| b.available).map(|b| b.kind)
    }

    /// `true` when at least one backend can run.
    pub fn any_available(&self) -> bool {
        self.first_available().is_some()
    }

    pub fn pdfium_library(&self) -> Option<&PdfiumLibrary> {
        self.pdfium_library.as_ref()
    }
}

/// Everything a backend needs for one document.
pub struct ExtractionRequest<'a> {
    pub pdf_path: &'a Path,
    /// Directory images are written to; created by the backend on demand.
    pub images_dir: &'a Path,
    pub password: Option<&'a str>,
    pub progress: &'a dyn ConversionProgressCallback,
}

/// A page-extraction capability.
///
/// Implementations are blocking and run on a `spawn_blocking` thread.
/// Returned pages must be numbered from 1; images must already exist at
/// their [`crate::output::ImageRecord::path`].
pub trait PageExtractor: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn extract(&self, request: &ExtractionRequest<'_>) -> Result<Vec<PageRecord>, ExtractionError>;
}

/// Pick the extractor for this run.
///
/// With `preferred` set, only that backend is considered.
pub fn select_extractor(
    caps: &Capabilities,
    preferred: Option<BackendKind>,
) -> Result<Arc<dyn PageExtractor>, ExtractionError> {
    let kind = match preferred {
        Some(kind) if caps.is_available(kind) => kind,
        Some(kind) => return Err(ExtractionError::BackendUnavailable(kind)),
        None => caps
            .first_available()
            .ok_or(ExtractionError::NoBackendAvailable)?,
    };

    let extractor: Arc<dyn PageExtractor> = match kind {
        BackendKind::Pdfium => {
            let library = caps
                .pdfium_library()
                .cloned()
                .ok_or(ExtractionError::BackendUnavailable(kind))?;
            Arc::new(PdfiumExtractor::new(library))
        }
        #[cfg(feature = "plain-text")]
        BackendKind::PlainText => Arc::new(PlainTextExtractor),
        #[cfg(not(feature = "plain-text"))]
        BackendKind::PlainText => return Err(ExtractionError::BackendUnavailable(kind)),
        BackendKind::Poppler => Arc::new(PopplerExtractor::new(caps.tools.clone())),
    };

    info!("Using {} backend", kind);
    Ok(extractor)
}

/// Run `extractor` on a blocking thread and return pages in ascending order.
pub async fn extract_pages(
    extractor: Arc<dyn PageExtractor>,
    pdf_path: PathBuf,
    images_dir: PathBuf,
    password: Option<String>,
    progress: ProgressCallback,
) -> Result<Vec<PageRecord>, Pdf2MdError> {
    let mut pages = tokio::task::spawn_blocking(move || {
        let request = ExtractionRequest {
            pdf_path: &pdf_path,
            images_dir: &images_dir,
            password: password.as_deref(),
            progress: progress.as_ref(),
        };
        extractor.extract(&request)
    })
    .await
    .map_err(|e| Pdf2MdError::Internal(format!("Extraction task panicked: {e}")))??;

    pages.sort_by_key(|p| p.page_number);
    Ok(pages)
}

/// Create `dir` if needed, mapping the failure to an image-write error.
pub(crate) fn ensure_images_dir(dir: &Path) -> Result<(), ExtractionError> {
    std::fs::create_dir_all(dir).map_err(|source| ExtractionError::ImageWrite {
        path: dir.to_path_buf(),
        source,
    })
}
