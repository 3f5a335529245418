//! pdfium backend: text and embedded images via `pdfium-render`.
//!
//! pdfium is a shared library loaded at run time, so "available" means a
//! library file was found *and* could be bound. Lookup order:
//!
//! 1. `PDFIUM_LIB_PATH` (a library file or the directory containing it)
//! 2. the directory of the running executable
//! 3. the current working directory
//! 4. the user cache directory (`~/.cache/pdf2markdown/` on Linux)
//! 5. the system library search path
//!
//! pdfium objects are not `Send`; the library is bound afresh inside the
//! blocking extraction call and only its location crosses threads.

use super::{ensure_images_dir, BackendKind, ExtractionRequest, PageExtractor};
use crate::error::ExtractionError;
use crate::output::{ImageRecord, PageRecord};
use image::{DynamicImage, ImageError, ImageFormat};
use pdfium_render::prelude::*;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[cfg(target_os = "macos")]
const LIBRARY_NAME: &str = "libpdfium.dylib";
#[cfg(target_os = "windows")]
const LIBRARY_NAME: &str = "pdfium.dll";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const LIBRARY_NAME: &str = "libpdfium.so";

/// Where a usable pdfium library lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfiumLibrary {
    /// An explicit library file.
    Path(PathBuf),
    /// Resolved by the platform's dynamic loader.
    System,
}

impl PdfiumLibrary {
    /// Probe the lookup locations and return the first library that binds.
    pub fn locate() -> Option<Self> {
        for candidate in candidate_paths() {
            if !candidate.is_file() {
                continue;
            }
            match Pdfium::bind_to_library(&candidate) {
                Ok(_) => {
                    debug!("pdfium found at {}", candidate.display());
                    return Some(PdfiumLibrary::Path(candidate));
                }
                Err(e) => debug!("pdfium at {} failed to bind: {:?}", candidate.display(), e),
            }
        }
        match Pdfium::bind_to_system_library() {
            Ok(_) => Some(PdfiumLibrary::System),
            Err(e) => {
                debug!("no system pdfium: {:?}", e);
                None
            }
        }
    }

    /// Bind the library and return a ready `Pdfium` handle.
    pub fn bind(&self) -> Result<Pdfium, PdfiumError> {
        let bindings = match self {
            PdfiumLibrary::Path(path) => Pdfium::bind_to_library(path)?,
            PdfiumLibrary::System => Pdfium::bind_to_system_library()?,
        };
        Ok(Pdfium::new(bindings))
    }
}

impl fmt::Display for PdfiumLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfiumLibrary::Path(p) => write!(f, "pdfium at {}", p.display()),
            PdfiumLibrary::System => f.write_str("pdfium (system library)"),
        }
    }
}

fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(env_path) = std::env::var("PDFIUM_LIB_PATH") {
        let p = PathBuf::from(env_path);
        if p.is_dir() {
            paths.push(p.join(LIBRARY_NAME));
        } else {
            paths.push(p);
        }
    }
    if let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        paths.push(dir.join(LIBRARY_NAME));
    }
    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(LIBRARY_NAME));
    }
    if let Some(cache) = dirs::cache_dir() {
        paths.push(cache.join("pdf2markdown").join(LIBRARY_NAME));
    }
    paths
}

/// Richest backend: per-page text plus every image object, re-encoded as PNG.
#[derive(Debug, Clone)]
pub struct PdfiumExtractor {
    library: PdfiumLibrary,
}

impl PdfiumExtractor {
    pub fn new(library: PdfiumLibrary) -> Self {
        Self { library }
    }
}

impl PageExtractor for PdfiumExtractor {
    fn kind(&self) -> BackendKind {
        BackendKind::Pdfium
    }

    fn extract(&self, request: &ExtractionRequest<'_>) -> Result<Vec<PageRecord>, ExtractionError> {
        let pdf_path = request.pdf_path;
        let pdfium = self
            .library
            .bind()
            .map_err(|e| ExtractionError::BackendFailed {
                backend: BackendKind::Pdfium,
                detail: format!("could not bind {}: {:?}", self.library, e),
            })?;

        let document = pdfium
            .load_pdf_from_file(pdf_path, request.password)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                let detail = if err_str.contains("Password") || err_str.contains("password") {
                    if request.password.is_some() {
                        "wrong password".to_string()
                    } else {
                        "document is encrypted; a password is required".to_string()
                    }
                } else {
                    err_str
                };
                ExtractionError::NotReadable {
                    path: pdf_path.to_path_buf(),
                    backend: BackendKind::Pdfium,
                    detail,
                }
            })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        info!("PDF loaded: {} pages", total_pages);
        request
            .progress
            .on_extraction_start(BackendKind::Pdfium, total_pages);
        ensure_images_dir(request.images_dir)?;

        let mut records = Vec::with_capacity(total_pages);
        for (idx, page) in pages.iter().enumerate() {
            let page_number = idx + 1;
            let raw_text = page
                .text()
                .map(|t| t.all())
                .map_err(|e| ExtractionError::BackendFailed {
                    backend: BackendKind::Pdfium,
                    detail: format!("text extraction failed on page {page_number}: {e:?}"),
                })?;

            let mut images = Vec::new();
            for object in page.objects().iter() {
                let Some(image_object) = object.as_image_object() else {
                    continue;
                };
                let image = match image_object.get_raw_image() {
                    Ok(image) => image,
                    Err(e) => {
                        warn!("Skipping undecodable image on page {}: {:?}", page_number, e);
                        continue;
                    }
                };
                let record = ImageRecord::stored(request.images_dir, page_number, images.len() + 1, "png")
                    .with_dimensions(image.width(), image.height());
                save_png(&image, &record.path)?;
                debug!(
                    "Page {} image {} → {}x{} px",
                    page_number,
                    record.index_on_page,
                    image.width(),
                    image.height()
                );
                images.push(record);
            }

            request
                .progress
                .on_page_extracted(page_number, total_pages, images.len());
            records.push(PageRecord {
                page_number,
                raw_text,
                images,
            });
        }

        Ok(records)
    }
}

/// Write `image` as PNG, widening pixel formats PNG cannot store.
fn save_png(image: &DynamicImage, path: &Path) -> Result<(), ExtractionError> {
    let to_write_error = |e: ImageError| ExtractionError::ImageWrite {
        path: path.to_path_buf(),
        source: match e {
            ImageError::IoError(io) => io,
            other => std::io::Error::other(other),
        },
    };

    match image.save_with_format(path, ImageFormat::Png) {
        Ok(()) => Ok(()),
        Err(ImageError::Unsupported(_)) => DynamicImage::ImageRgba8(image.to_rgba8())
            .save_with_format(path, ImageFormat::Png)
            .map_err(to_write_error),
        Err(e) => Err(to_write_error(e)),
    }
}
