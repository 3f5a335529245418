//! Configuration types for PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Callers set only the knobs they care
//! about and rely on the documented defaults for the rest.

use crate::error::Pdf2MdError;
use crate::pipeline::extract::{BackendKind, Capabilities, PageExtractor};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default directory for converted Markdown files.
pub const DEFAULT_OUTPUT_DIR: &str = "output_docs";
/// Default OAuth client secrets file.
pub const DEFAULT_CREDENTIALS_FILE: &str = "credentials.json";
/// Default cached OAuth token file.
pub const DEFAULT_TOKEN_FILE: &str = "token.json";

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2markdown::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .output_dir("converted")
///     .keep_temp(true)
///     .download_timeout_secs(300)
///     .build()
///     .unwrap();
/// assert_eq!(config.output_path_for("datasheet.pdf"), std::path::Path::new("converted/datasheet.md"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Directory the Markdown file is written to when `output_file` is unset.
    /// Default: `output_docs`.
    pub output_dir: PathBuf,

    /// Exact Markdown output path. Takes precedence over `output_dir`.
    pub output_file: Option<PathBuf>,

    /// Keep a downloaded PDF on disk after conversion. Default: false.
    pub keep_temp: bool,

    /// Download Google Drive files through the authenticated Drive API.
    pub use_auth: bool,

    /// OAuth client secrets (installed-app JSON). Default: `credentials.json`.
    pub credentials_file: PathBuf,

    /// Cached OAuth token. Default: `token.json`.
    pub token_file: PathBuf,

    /// User password for encrypted PDFs.
    pub password: Option<String>,

    /// Force a specific extraction backend instead of the best available one.
    pub backend: Option<BackendKind>,

    /// Pre-probed backend availability. Probed on demand when `None`.
    pub capabilities: Option<Capabilities>,

    /// Pre-constructed extractor. Takes precedence over `backend` and
    /// `capabilities`.
    pub extractor: Option<Arc<dyn PageExtractor>>,

    /// Receives download and extraction events.
    pub progress_callback: Option<ProgressCallback>,

    /// Longest allowed wait, in seconds, for a download connection or for the
    /// next chunk of its body. A transfer that keeps delivering data is never
    /// cut off. Default: 120.
    pub download_timeout_secs: u64,

    /// Timeout for Drive metadata and OAuth token requests, in seconds. Default: 10.
    pub metadata_timeout_secs: u64,

    /// How long to wait for the browser consent redirect, in seconds. Default: 300.
    pub auth_timeout_secs: u64,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            output_file: None,
            keep_temp: false,
            use_auth: false,
            credentials_file: PathBuf::from(DEFAULT_CREDENTIALS_FILE),
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            password: None,
            backend: None,
            capabilities: None,
            extractor: None,
            progress_callback: None,
            download_timeout_secs: 120,
            metadata_timeout_secs: 10,
            auth_timeout_secs: 300,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("output_dir", &self.output_dir)
            .field("output_file", &self.output_file)
            .field("keep_temp", &self.keep_temp)
            .field("use_auth", &self.use_auth)
            .field("credentials_file", &self.credentials_file)
            .field("token_file", &self.token_file)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("backend", &self.backend)
            .field("capabilities", &self.capabilities.as_ref().map(|c| c.first_available()))
            .field("extractor", &self.extractor.as_ref().map(|e| e.kind()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("metadata_timeout_secs", &self.metadata_timeout_secs)
            .field("auth_timeout_secs", &self.auth_timeout_secs)
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Where the Markdown for a source named `file_name` is written.
    pub fn output_path_for(&self, file_name: &str) -> PathBuf {
        if let Some(file) = &self.output_file {
            return file.clone();
        }
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "document".to_string());
        self.output_dir.join(format!("{stem}.md"))
    }

    /// The configured progress callback, or a no-op.
    pub fn progress(&self) -> ProgressCallback {
        self.progress_callback
            .clone()
            .unwrap_or_else(|| Arc::new(NoopProgressCallback))
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn output_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.output_file = Some(file.into());
        self
    }

    pub fn keep_temp(mut self, v: bool) -> Self {
        self.config.keep_temp = v;
        self
    }

    pub fn use_auth(mut self, v: bool) -> Self {
        self.config.use_auth = v;
        self
    }

    pub fn credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.credentials_file = path.into();
        self
    }

    pub fn token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.token_file = path.into();
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.config.backend = Some(kind);
        self
    }

    pub fn capabilities(mut self, caps: Capabilities) -> Self {
        self.config.capabilities = Some(caps);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.config.extractor = Some(extractor);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn metadata_timeout_secs(mut self, secs: u64) -> Self {
        self.config.metadata_timeout_secs = secs;
        self
    }

    pub fn auth_timeout_secs(mut self, secs: u64) -> Self {
        self.config.auth_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Pdf2MdError> {
        let c = &self.config;
        for (name, secs) in [
            ("download timeout", c.download_timeout_secs),
            ("metadata timeout", c.metadata_timeout_secs),
            ("auth timeout", c.auth_timeout_secs),
        ] {
            if secs == 0 {
                return Err(Pdf2MdError::InvalidConfig(format!("{name} must be ≥ 1 second")));
            }
        }
        if let Some(file) = &c.output_file {
            if file.is_dir() {
                return Err(Pdf2MdError::InvalidConfig(format!(
                    "output file {:?} is a directory",
                    file
                )));
            }
        }
        if let (Some(extractor), Some(backend)) = (&c.extractor, c.backend) {
            if extractor.kind() != backend {
                return Err(Pdf2MdError::InvalidConfig(format!(
                    "injected {} extractor conflicts with requested backend {}",
                    extractor.kind(),
                    backend
                )));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.output_dir, PathBuf::from("output_docs"));
        assert_eq!(c.credentials_file, PathBuf::from("credentials.json"));
        assert_eq!(c.token_file, PathBuf::from("token.json"));
        assert_eq!(c.download_timeout_secs, 120);
        assert_eq!(c.metadata_timeout_secs, 10);
        assert!(!c.keep_temp && !c.use_auth);
    }

    #[test]
    fn output_path_uses_stem() {
        let c = ConversionConfig::builder().output_dir("out").build().unwrap();
        assert_eq!(c.output_path_for("Keraunos_PCIe_Tile.pdf"), PathBuf::from("out/Keraunos_PCIe_Tile.md"));
        assert_eq!(c.output_path_for(""), PathBuf::from("out/document.md"));
    }

    #[test]
    fn explicit_output_file_wins() {
        let c = ConversionConfig::builder()
            .output_dir("ignored")
            .output_file("notes/datasheet.md")
            .build()
            .unwrap();
        assert_eq!(c.output_path_for("other.pdf"), PathBuf::from("notes/datasheet.md"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = ConversionConfig::builder()
            .download_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Pdf2MdError::InvalidConfig(_)));
    }

    #[test]
    fn directory_output_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConversionConfig::builder()
            .output_file(dir.path())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("directory"));
    }

    #[test]
    fn debug_redacts_password() {
        let c = ConversionConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
