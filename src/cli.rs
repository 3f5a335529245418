//! Terminal helpers shared by the `convert-pdf` and `pdf2md-diagrams` binaries.
//!
//! Compiled only with the `cli` feature.

use crate::error::Pdf2MdError;
use crate::pipeline::extract::{BackendKind, Capabilities};
use crate::progress::ConversionProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

pub fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
pub fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
pub fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
pub fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
pub fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
pub fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

/// Install the stderr tracing subscriber.
///
/// INFO-level library logs are suppressed while a progress bar is active;
/// the bar already reports what matters. `RUST_LOG` overrides everything.
pub fn init_tracing(verbose: bool, quiet: bool, show_progress: bool) {
    let filter = if verbose {
        "debug"
    } else if quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();
}

// ── Formatting ───────────────────────────────────────────────────────────────

/// `1234567` → `"1,234,567"`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `"2,097,152 bytes (2.00 MB)"`, or KB below one megabyte.
pub fn human_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{} bytes ({:.2} MB)", thousands(bytes), bytes as f64 / 1024.0 / 1024.0)
    } else {
        format!("{} bytes ({:.2} KB)", thousands(bytes), bytes as f64 / 1024.0)
    }
}

/// The first `max_chars` characters of `text` and whether it was cut.
pub fn preview(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// One `✅`/`❌` line per backend and poppler tool.
pub fn capability_report(caps: &Capabilities) -> String {
    let mark = |ok: bool| if ok { "✅" } else { "❌" };
    let mut out = String::from("Extraction backends (in priority order):\n");
    for (rank, b) in caps.backends.iter().enumerate() {
        out.push_str(&format!(
            "  {}. {:<11} {}  {}\n",
            rank + 1,
            b.kind.as_str(),
            mark(b.available),
            b.detail
        ));
    }
    out.push_str("\nSystem tools:\n");
    for (tool, available) in caps.tools.entries() {
        out.push_str(&format!("  {:<10} {}\n", tool, mark(available)));
    }
    out
}

/// Markdown path for `pdf2md-diagrams`.
///
/// No output: `{pdf_dir}/{stem}.md`. An output ending in a path separator or
/// naming an existing directory gets `{stem}.md` appended. Anything else is
/// used as the file path.
pub fn diagrams_output_path(pdf: &Path, output: Option<&Path>) -> PathBuf {
    let stem = pdf
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let file_name = format!("{stem}.md");
    match output {
        None => pdf.parent().unwrap_or_else(|| Path::new("")).join(file_name),
        Some(out) => {
            let raw = out.as_os_str().to_string_lossy();
            if raw.ends_with('/') || raw.ends_with(std::path::MAIN_SEPARATOR) || out.is_dir() {
                out.join(file_name)
            } else {
                out.to_path_buf()
            }
        }
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal progress: a spinner while resolving, a byte bar while
/// downloading, then a page bar during extraction.
pub struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    pub fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        Self::spinner(&bar, "Preparing", "Resolving input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn spinner(bar: &ProgressBar, prefix: &'static str, msg: &'static str) {
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix(prefix);
        bar.set_message(msg);
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_download_start(&self, file_id: &str, total_bytes: Option<u64>) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Downloading Google Drive file {file_id}"))
        ));
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_prefix("Download");
        self.bar.set_length(total_bytes.unwrap_or(0));
        self.bar.set_position(0);
        self.bar.reset_eta();
    }

    fn on_download_progress(&self, downloaded: u64, total_bytes: Option<u64>) {
        if total_bytes.is_none() && self.bar.length().unwrap_or(0) < downloaded {
            self.bar.set_length(downloaded);
        }
        self.bar.set_position(downloaded);
    }

    fn on_download_complete(&self, path: &Path, bytes: u64) {
        self.bar.println(format!(
            "  {} Downloaded {}  {}",
            green("✓"),
            path.display(),
            dim(&human_size(bytes))
        ));
        Self::spinner(&self.bar, "Preparing", "Opening PDF…");
    }

    fn on_extraction_start(&self, backend: BackendKind, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        self.bar.set_style(style);
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_pages} pages with {backend}…"))
        ));
        if !backend.extracts_images() {
            self.bar.println(format!(
                "  {} {}",
                yellow("⚠"),
                dim("this backend extracts text only; no images will be saved")
            ));
        }
    }

    fn on_page_extracted(&self, page_num: usize, total_pages: usize, image_count: usize) {
        let images = match image_count {
            0 => String::new(),
            1 => "1 image".to_string(),
            n => format!("{n} images"),
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}",
            green("✓"),
            page_num,
            total_pages,
            dim(&images),
        ));
        self.bar.inc(1);
    }

    fn on_temp_cleanup(&self, path: &Path, removed: bool) {
        let line = if removed {
            format!("  {} Cleaned up temporary file {}", dim("🧹"), path.display())
        } else {
            format!("  {} Kept downloaded file {}", dim("📥"), path.display())
        };
        self.bar.println(line);
    }

    fn on_conversion_complete(&self, total_pages: usize, total_images: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} pages, {} images converted",
            green("✔"),
            bold(&total_pages.to_string()),
            bold(&total_images.to_string())
        );
    }

    fn on_conversion_failed(&self, _error: &Pdf2MdError) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extract::{PdfiumLibrary, SystemTools};

    #[test]
    fn thousands_separators() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
    }

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(2048), "2,048 bytes (2.00 KB)");
        assert_eq!(human_size(2 * 1024 * 1024), "2,097,152 bytes (2.00 MB)");
    }

    #[test]
    fn preview_respects_char_boundaries() {
        let text = "é".repeat(600);
        let (head, cut) = preview(&text, 500);
        assert!(cut);
        assert_eq!(head.chars().count(), 500);

        let (head, cut) = preview("short", 500);
        assert_eq!((head, cut), ("short", false));
    }

    #[test]
    fn diagrams_output_defaults_next_to_pdf() {
        assert_eq!(
            diagrams_output_path(Path::new("doc/keraunos_pcie_tile.pdf"), None),
            PathBuf::from("doc/keraunos_pcie_tile.md")
        );
    }

    #[test]
    fn diagrams_output_directory_forms() {
        let pdf = Path::new("input.pdf");
        assert_eq!(
            diagrams_output_path(pdf, Some(Path::new("output_dir/"))),
            PathBuf::from("output_dir/input.md")
        );
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(diagrams_output_path(pdf, Some(dir.path())), dir.path().join("input.md"));
        assert_eq!(
            diagrams_output_path(pdf, Some(Path::new("out/custom.md"))),
            PathBuf::from("out/custom.md")
        );
    }

    #[test]
    fn failure_clears_the_progress_bar() {
        let cb = CliProgressCallback {
            bar: ProgressBar::hidden(),
        };
        cb.on_extraction_start(BackendKind::Poppler, 4);
        cb.on_page_extracted(1, 4, 0);
        assert!(!cb.bar.is_finished());
        cb.on_conversion_failed(&Pdf2MdError::Internal("extraction stopped".into()));
        assert!(cb.bar.is_finished());
    }

    #[test]
    fn report_lists_backends_and_tools() {
        let caps = Capabilities::from_parts(
            Some(PdfiumLibrary::System),
            false,
            SystemTools {
                pdftotext: true,
                ..SystemTools::default()
            },
        );
        let report = capability_report(&caps);
        assert!(report.contains("1. pdfium"));
        assert!(report.contains("2. plain-text"));
        assert!(report.contains("pdfimages  ❌"));
        assert!(report.contains("pdftotext  ✅"));
    }
}
