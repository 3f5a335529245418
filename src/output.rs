//! Output types: extracted page records and conversion results.
//!
//! [`PageRecord`] and [`ImageRecord`] are produced once by the extraction
//! stage and never mutated afterwards; the formatter only borrows them.
//! [`ConversionOutput`] is what a successful run returns, and
//! [`ConversionOutcome`] is the flattened success/error form the binaries
//! print or serialise at the process boundary.

use crate::error::Pdf2MdError;
use crate::pipeline::extract::BackendKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Directory (relative to the Markdown file) that holds extracted images.
pub const IMAGES_DIR_NAME: &str = "images";

/// Text and images extracted from a single PDF page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// 1-indexed page number.
    pub page_number: usize,
    /// Raw page text as produced by the backend (newline separated).
    pub raw_text: String,
    /// Images found on the page, already written to disk.
    pub images: Vec<ImageRecord>,
}

impl PageRecord {
    pub fn new(page_number: usize, raw_text: impl Into<String>) -> Self {
        Self {
            page_number,
            raw_text: raw_text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_images(mut self, images: Vec<ImageRecord>) -> Self {
        self.images = images;
        self
    }
}

/// An embedded image persisted by the extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Page the image was found on (1-indexed).
    pub source_page: usize,
    /// Position of the image on its page (1-indexed).
    pub index_on_page: usize,
    /// File name inside the images directory, e.g. `page_2_img_1.png`.
    pub file_name: String,
    /// Where the file was written.
    pub path: PathBuf,
    /// Path relative to the Markdown document, normally `images/{file_name}`.
    pub relative_path: String,
    /// Width in pixels, when the backend reports it.
    pub width: Option<u32>,
    /// Height in pixels, when the backend reports it.
    pub height: Option<u32>,
    /// File extension without the dot (`png`, `jpg`, …).
    pub format_extension: String,
}

impl ImageRecord {
    /// Canonical file name for the `index`-th image on `page`.
    pub fn file_name_for(page: usize, index: usize, extension: &str) -> String {
        format!("page_{page}_img_{index}.{extension}")
    }

    /// Build a record for an image already written to `images_dir`.
    pub fn stored(
        images_dir: &std::path::Path,
        page: usize,
        index: usize,
        extension: impl Into<String>,
    ) -> Self {
        let format_extension = extension.into();
        let file_name = Self::file_name_for(page, index, &format_extension);
        Self {
            source_page: page,
            index_on_page: index,
            path: images_dir.join(&file_name),
            relative_path: format!("{IMAGES_DIR_NAME}/{file_name}"),
            file_name,
            width: None,
            height: None,
            format_extension,
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// The path used in the Markdown image reference.
    ///
    /// Anything not already under `images/` is re-rooted there by file name.
    pub fn markdown_path(&self) -> String {
        let prefix = format!("{IMAGES_DIR_NAME}/");
        if self.relative_path.starts_with(&prefix) {
            self.relative_path.clone()
        } else {
            format!("{prefix}{}", self.file_name)
        }
    }

    /// Both dimensions, when both are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }
}

/// Where the converted PDF came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// The reference the user supplied (path, URL or Drive file ID).
    pub input: String,
    /// Local path the PDF was read from.
    pub local_path: PathBuf,
    /// File name used for the document title and default output name.
    pub file_name: String,
    /// `true` when the PDF was downloaded to a temporary location.
    pub downloaded: bool,
    /// Set when a temporary download was kept on disk (`--keep-temp`).
    pub retained_path: Option<PathBuf>,
}

/// Statistics for a conversion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_images: usize,
    pub backend: BackendKind,
    pub input_bytes: u64,
    pub output_bytes: u64,
    pub extraction_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of a successful conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// The rendered Markdown document.
    pub markdown: String,
    /// Where the Markdown was written.
    pub output_path: PathBuf,
    /// Directory holding the extracted images.
    pub images_dir: PathBuf,
    pub source: SourceInfo,
    /// Extracted pages in ascending page order.
    pub pages: Vec<PageRecord>,
    pub stats: ConversionStats,
}

/// Flattened success/error result reported at the process boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    pub success: bool,
    pub output_path: Option<PathBuf>,
    pub error: Option<String>,
    pub stats: Option<ConversionStats>,
}

impl ConversionOutcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output_path: None,
            error: Some(message.into()),
            stats: None,
        }
    }
}

impl From<&Result<ConversionOutput, Pdf2MdError>> for ConversionOutcome {
    fn from(result: &Result<ConversionOutput, Pdf2MdError>) -> Self {
        match result {
            Ok(output) => Self {
                success: true,
                output_path: Some(output.output_path.clone()),
                error: None,
                stats: Some(output.stats.clone()),
            },
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn stored_image_uses_canonical_names() {
        let img = ImageRecord::stored(Path::new("/out/images"), 2, 1, "png");
        assert_eq!(img.file_name, "page_2_img_1.png");
        assert_eq!(img.relative_path, "images/page_2_img_1.png");
        assert_eq!(img.path, Path::new("/out/images/page_2_img_1.png"));
        assert_eq!(img.dimensions(), None);
    }

    #[test]
    fn markdown_path_normalises_foreign_prefix() {
        let mut img = ImageRecord::stored(Path::new("/tmp"), 1, 3, "jpg");
        img.relative_path = "/tmp/page_1_img_3.jpg".into();
        assert_eq!(img.markdown_path(), "images/page_1_img_3.jpg");
    }

    #[test]
    fn dimensions_require_both_sides() {
        let mut img = ImageRecord::stored(Path::new("/tmp"), 1, 1, "png");
        img.width = Some(10);
        assert_eq!(img.dimensions(), None);
        let img = img.with_dimensions(800, 600);
        assert_eq!(img.dimensions(), Some((800, 600)));
    }

    #[test]
    fn outcome_from_error_carries_message() {
        let result: Result<ConversionOutput, Pdf2MdError> = Err(Pdf2MdError::FileNotFound {
            path: "missing.pdf".into(),
        });
        let outcome = ConversionOutcome::from(&result);
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("missing.pdf"));
        assert!(outcome.output_path.is_none());
    }
}
