//! Conversion entry points.
//!
//! [`convert`] drives the whole pipeline for one document: resolve the
//! input, extract pages, format, verify image links, write. A temporary
//! download is released after the run whether it succeeded or not.

use crate::config::ConversionConfig;
use crate::error::Pdf2MdError;
use crate::output::{ConversionOutput, ConversionStats, SourceInfo, IMAGES_DIR_NAME};
use crate::pipeline::extract::{self, Capabilities, PageExtractor};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::{format, write};
use crate::progress::ProgressCallback;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Convert a local PDF, Google Drive URL or Drive file ID to Markdown.
///
/// This is the primary entry point for the library. The Markdown file is
/// written to [`ConversionConfig::output_path_for`] and images to an
/// `images/` directory beside it.
///
/// # Errors
/// Every error is fatal for the run: unresolvable input, a refused or failed
/// download, missing OAuth credentials, no usable backend, a backend
/// failure, or an unwritable output. A backend that recovers text but no
/// images is not an error.
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);
    let progress = config.progress();

    let result = run(input_str, config, &progress, total_start).await;
    if let Err(e) = &result {
        progress.on_conversion_failed(e);
    }
    result
}

async fn run(
    input_str: &str,
    config: &ConversionConfig,
    progress: &ProgressCallback,
    total_start: Instant,
) -> Result<ConversionOutput, Pdf2MdError> {
    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config).await?;

    let result = convert_resolved(input_str, &resolved, config, progress, total_start).await;

    // ── Step 6: Release temporary download (success or failure) ──────────
    let retained = resolved.finish(config.keep_temp, progress.as_ref());
    result.map(|mut output| {
        output.source.retained_path = retained;
        output
    })
}

async fn convert_resolved(
    input_str: &str,
    resolved: &ResolvedInput,
    config: &ConversionConfig,
    progress: &ProgressCallback,
    total_start: Instant,
) -> Result<ConversionOutput, Pdf2MdError> {
    let pdf_path = resolved.path().to_path_buf();
    let file_name = resolved.file_name();
    let input_bytes = tokio::fs::metadata(&pdf_path)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    let output_path = config.output_path_for(&file_name);
    let images_dir = output_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(IMAGES_DIR_NAME);
    debug!(
        "Output: {} (images in {})",
        output_path.display(),
        images_dir.display()
    );

    // ── Step 2: Pick backend ─────────────────────────────────────────────
    let extractor = resolve_extractor(config).await?;
    let backend = extractor.kind();

    // ── Step 3: Extract pages ────────────────────────────────────────────
    let extraction_start = Instant::now();
    let pages = extract::extract_pages(
        extractor,
        pdf_path.clone(),
        images_dir.clone(),
        config.password.clone(),
        progress.clone(),
    )
    .await?;
    let extraction_duration_ms = extraction_start.elapsed().as_millis() as u64;
    let total_images: usize = pages.iter().map(|p| p.images.len()).sum();
    info!(
        "Extracted {} pages and {} images in {}ms",
        pages.len(),
        total_images,
        extraction_duration_ms
    );

    // ── Step 4: Format ───────────────────────────────────────────────────
    let document = format::build_document(&pages, &file_name);
    let markdown = document.render();

    // ── Step 5: Verify and write ─────────────────────────────────────────
    write::verify_image_links(&document, &output_path)?;
    let output_bytes = write::write_markdown(&output_path, &markdown).await?;
    progress.on_conversion_complete(pages.len(), total_images);

    let stats = ConversionStats {
        total_pages: pages.len(),
        total_images,
        backend,
        input_bytes,
        output_bytes,
        extraction_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Conversion complete: {} pages, {} images, {}ms total",
        stats.total_pages, stats.total_images, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        markdown,
        output_path,
        images_dir,
        source: SourceInfo {
            input: input_str.to_string(),
            local_path: pdf_path,
            file_name,
            downloaded: resolved.is_temporary(),
            retained_path: None,
        },
        pages,
        stats,
    })
}

async fn resolve_extractor(config: &ConversionConfig) -> Result<Arc<dyn PageExtractor>, Pdf2MdError> {
    if let Some(extractor) = &config.extractor {
        return Ok(extractor.clone());
    }
    let caps = match &config.capabilities {
        Some(caps) => caps.clone(),
        None => inspect_capabilities().await?,
    };
    Ok(extract::select_extractor(&caps, config.backend)?)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Pdf2MdError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2MdError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Probe which extraction backends and poppler tools this machine offers.
///
/// Probing binds shared libraries and spawns processes, so it runs on a
/// blocking thread.
pub async fn inspect_capabilities() -> Result<Capabilities, Pdf2MdError> {
    tokio::task::spawn_blocking(Capabilities::probe)
        .await
        .map_err(|e| Pdf2MdError::Internal(format!("Capability probe panicked: {e}")))
}
