//! Progress-callback trait for download and extraction events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events while a document is downloaded and its pages are extracted. The
//! binaries use it to drive an `indicatif` progress bar; library users can
//! forward the events anywhere without the library knowing how.
//!
//! Extraction runs on a blocking worker thread, so implementations must be
//! `Send + Sync`. Every method has a no-op default.
//!
//! # Example
//!
//! ```rust
//! use pdf2markdown::{ConversionConfig, ConversionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct PageCounter(AtomicUsize);
//!
//! impl ConversionProgressCallback for PageCounter {
//!     fn on_page_extracted(&self, page_num: usize, _total: usize, images: usize) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("page {page_num}: {images} images");
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(Arc::new(PageCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::Pdf2MdError;
use crate::pipeline::extract::BackendKind;
use std::path::Path;
use std::sync::Arc;

/// Receives events from the conversion pipeline.
pub trait ConversionProgressCallback: Send + Sync {
    /// A Google Drive download is about to stream `total_bytes` (if known).
    fn on_download_start(&self, file_id: &str, total_bytes: Option<u64>) {
        let _ = (file_id, total_bytes);
    }

    /// Called for every chunk written to the temporary file.
    fn on_download_progress(&self, downloaded: u64, total_bytes: Option<u64>) {
        let _ = (downloaded, total_bytes);
    }

    /// The download finished and was written to `path`.
    fn on_download_complete(&self, path: &Path, bytes: u64) {
        let _ = (path, bytes);
    }

    /// The backend opened the document and knows its page count.
    fn on_extraction_start(&self, backend: BackendKind, total_pages: usize) {
        let _ = (backend, total_pages);
    }

    /// One page's text and images have been extracted.
    fn on_page_extracted(&self, page_num: usize, total_pages: usize, image_count: usize) {
        let _ = (page_num, total_pages, image_count);
    }

    /// The temporary download was deleted (`removed = true`) or kept.
    fn on_temp_cleanup(&self, path: &Path, removed: bool) {
        let _ = (path, removed);
    }

    /// The Markdown file was written.
    fn on_conversion_complete(&self, total_pages: usize, total_images: usize) {
        let _ = (total_pages, total_images);
    }

    /// The run stopped with `error`; no further events follow.
    fn on_conversion_failed(&self, error: &Pdf2MdError) {
        let _ = error;
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        pages: AtomicUsize,
        images: AtomicUsize,
        downloaded: AtomicU64,
    }

    impl ConversionProgressCallback for TrackingCallback {
        fn on_download_progress(&self, downloaded: u64, _total: Option<u64>) {
            self.downloaded.store(downloaded, Ordering::SeqCst);
        }

        fn on_page_extracted(&self, _page_num: usize, _total: usize, image_count: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
            self.images.fetch_add(image_count, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_download_start("id", Some(10));
        cb.on_download_progress(5, Some(10));
        cb.on_download_complete(Path::new("/tmp/x.pdf"), 10);
        cb.on_extraction_start(BackendKind::Pdfium, 3);
        cb.on_page_extracted(1, 3, 2);
        cb.on_temp_cleanup(Path::new("/tmp/x.pdf"), true);
        cb.on_conversion_complete(3, 2);
        cb.on_conversion_failed(&Pdf2MdError::Internal("boom".into()));
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_download_progress(4096, None);
        tracker.on_page_extracted(1, 2, 3);
        tracker.on_page_extracted(2, 2, 0);
        assert_eq!(tracker.downloaded.load(Ordering::SeqCst), 4096);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.images.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(BackendKind::Poppler, 10);
    }
}
