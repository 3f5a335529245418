//! Input resolution: normalise a user-supplied reference to a local PDF.
//!
//! A reference is tried, in order, as:
//!
//! 1. an existing local path;
//! 2. a Google Drive share URL or bare file ID, downloaded into a `TempDir`;
//! 3. any other `http(s)` URL, which is rejected as unsupported.
//!
//! Anything else is reported as a missing file. The PDF magic bytes (`%PDF`)
//! are validated before returning so callers get a meaningful error rather
//! than a backend parse failure.

use super::gdrive;
use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use crate::progress::ConversionProgressCallback;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// The resolved input: a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was downloaded from Google Drive. The `TempDir` keeps the file
    /// alive until [`ResolvedInput::finish`] decides its fate.
    Downloaded {
        path: PathBuf,
        file_name: String,
        temp_dir: TempDir,
    },
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// Name used for the document title and the default output file.
    pub fn file_name(&self) -> String {
        match self {
            ResolvedInput::Local(p) => p
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            ResolvedInput::Downloaded { file_name, .. } => file_name.clone(),
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, ResolvedInput::Downloaded { .. })
    }

    /// Release the temporary download, or keep it when `keep` is set.
    ///
    /// Returns the retained path for kept downloads. Local inputs are never
    /// touched. A failed deletion is logged, not raised.
    pub fn finish(self, keep: bool, progress: &dyn ConversionProgressCallback) -> Option<PathBuf> {
        let ResolvedInput::Downloaded { path, temp_dir, .. } = self else {
            return None;
        };
        if keep {
            let _dir = temp_dir.keep();
            info!("Keeping downloaded file: {}", path.display());
            progress.on_temp_cleanup(&path, false);
            return Some(path);
        }
        match temp_dir.close() {
            Ok(()) => {
                info!("Cleaned up temporary file: {}", path.display());
                progress.on_temp_cleanup(&path, true);
            }
            Err(e) => {
                warn!("Could not delete temporary file {}: {}", path.display(), e);
                progress.on_temp_cleanup(&path, false);
            }
        }
        None
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local PDF file path.
pub async fn resolve_input(input: &str, config: &ConversionConfig) -> Result<ResolvedInput, Pdf2MdError> {
    let input = input.trim();
    let path = Path::new(input);
    if !input.is_empty() && path.exists() {
        return resolve_local(path);
    }

    if let Some(file_id) = gdrive::extract_file_id(input) {
        let download = gdrive::download(&file_id, config).await?;
        check_magic(&download.path)?;
        return Ok(ResolvedInput::Downloaded {
            path: download.path,
            file_name: download.file_name,
            temp_dir: download.temp_dir,
        });
    }

    if is_url(input) {
        return Err(Pdf2MdError::UnsupportedUrl {
            url: input.to_string(),
        });
    }

    Err(Pdf2MdError::FileNotFound {
        path: PathBuf::from(input),
    })
}

/// Resolve a local file path, validating readability and PDF magic bytes.
fn resolve_local(path: &Path) -> Result<ResolvedInput, Pdf2MdError> {
    if path.is_dir() {
        return Err(Pdf2MdError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    check_magic(path)?;
    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path.to_path_buf()))
}

/// Fail unless the file starts with `%PDF`. Files shorter than four bytes
/// pass through and are left to the backend to reject.
pub fn check_magic(path: &Path) -> Result<(), Pdf2MdError> {
    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Pdf2MdError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(Pdf2MdError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
        return Err(Pdf2MdError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }
    Ok(())
}
