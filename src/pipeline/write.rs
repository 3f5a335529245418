//! Output writing: image-link verification and the atomic Markdown write.

use super::format::{MarkdownDocument, Segment};
use crate::error::Pdf2MdError;
use std::path::Path;
use tracing::debug;

/// Check that every image the document references exists relative to `md_path`.
pub fn verify_image_links(document: &MarkdownDocument, md_path: &Path) -> Result<(), Pdf2MdError> {
    let md_dir = md_path.parent().unwrap_or_else(|| Path::new(""));
    for segment in document.segments() {
        if let Segment::Image { path, .. } = segment {
            let on_disk = md_dir.join(path);
            if !on_disk.is_file() {
                return Err(Pdf2MdError::MissingImage {
                    reference: path.clone(),
                    path: on_disk,
                });
            }
        }
    }
    Ok(())
}

/// Write `markdown` to `path` via a temp file and rename, creating parent
/// directories. Returns the number of bytes written.
pub async fn write_markdown(path: &Path, markdown: &str) -> Result<u64, Pdf2MdError> {
    let write_error = |source: std::io::Error| Pdf2MdError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown).await.map_err(write_error)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_error)?;

    debug!("Wrote {} bytes to {}", markdown.len(), path.display());
    Ok(markdown.len() as u64)
}
