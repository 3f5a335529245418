//! poppler-utils backend: shells out to `pdftotext`, `pdfinfo` and `pdfimages`.
//!
//! `pdftotext -layout` emits every page separated by a form feed. Images are
//! dumped in their native encoding with `pdfimages -all -p`, which puts the
//! page number in each file name, then renamed to the canonical
//! `page_{page}_img_{index}.{ext}` layout. `pdfimages -list` supplies the
//! pixel dimensions.

use super::{ensure_images_dir, BackendKind, ExtractionRequest, PageExtractor};
use crate::error::ExtractionError;
use crate::output::{ImageRecord, PageRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::{debug, info, warn};

static PAGES_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"Pages:\s+(\d+)").unwrap());

/// File name written by `pdfimages -p`: `{root}-{page}-{num}.{ext}`.
static DUMPED_IMAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^img-(\d+)-(\d+)\.([A-Za-z0-9]+)$").unwrap());

/// poppler command-line tools found on `PATH`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTools {
    pub pdftotext: bool,
    pub pdfimages: bool,
    pub pdftoppm: bool,
    pub pdfinfo: bool,
}

impl SystemTools {
    /// Check each tool by running `{tool} -v`; a successful spawn counts.
    pub fn probe() -> Self {
        Self {
            pdftotext: tool_runs("pdftotext"),
            pdfimages: tool_runs("pdfimages"),
            pdftoppm: tool_runs("pdftoppm"),
            pdfinfo: tool_runs("pdfinfo"),
        }
    }

    /// `(name, available)` pairs in a stable order, for reports.
    pub fn entries(&self) -> [(&'static str, bool); 4] {
        [
            ("pdftotext", self.pdftotext),
            ("pdfimages", self.pdfimages),
            ("pdftoppm", self.pdftoppm),
            ("pdfinfo", self.pdfinfo),
        ]
    }
}

fn tool_runs(tool: &str) -> bool {
    let found = Command::new(tool)
        .arg("-v")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok();
    debug!("{}: {}", tool, if found { "found" } else { "missing" });
    found
}

/// Text through `pdftotext`; images through `pdfimages` when it is installed.
#[derive(Debug, Clone)]
pub struct PopplerExtractor {
    tools: SystemTools,
}

impl PopplerExtractor {
    pub fn new(tools: SystemTools) -> Self {
        Self { tools }
    }
}

impl PageExtractor for PopplerExtractor {
    fn kind(&self) -> BackendKind {
        BackendKind::Poppler
    }

    fn extract(&self, request: &ExtractionRequest<'_>) -> Result<Vec<PageRecord>, ExtractionError> {
        if !self.tools.pdftotext {
            return Err(ExtractionError::BackendUnavailable(BackendKind::Poppler));
        }
        let pdf_path = request.pdf_path;

        let page_count = if self.tools.pdfinfo {
            page_count(pdf_path, request.password)
        } else {
            None
        };

        let output = run("pdftotext", request.password, |cmd| {
            cmd.arg("-layout").arg(pdf_path).arg("-");
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stderr.contains("Incorrect password") || stderr.contains("Couldn't open") {
                return Err(ExtractionError::NotReadable {
                    path: pdf_path.to_path_buf(),
                    backend: BackendKind::Poppler,
                    detail: stderr,
                });
            }
            return Err(ExtractionError::BackendFailed {
                backend: BackendKind::Poppler,
                detail: format!("pdftotext exited with {}: {}", output.status, stderr),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout);
        let page_texts = split_pages(&text, page_count);
        let total_pages = page_texts.len();
        info!("PDF loaded: {} pages", total_pages);
        request
            .progress
            .on_extraction_start(BackendKind::Poppler, total_pages);

        let mut images_by_page = if self.tools.pdfimages {
            ensure_images_dir(request.images_dir)?;
            match dump_images(pdf_path, request.images_dir, request.password) {
                Ok(images) => images,
                Err(detail) => {
                    warn!("pdfimages failed, continuing without images: {}", detail);
                    BTreeMap::new()
                }
            }
        } else {
            warn!("pdfimages not found; images will not be extracted");
            BTreeMap::new()
        };

        discard_pages_beyond(&mut images_by_page, total_pages);

        let pages = page_texts
            .into_iter()
            .enumerate()
            .map(|(idx, raw_text)| {
                let page_number = idx + 1;
                let images = images_by_page.remove(&page_number).unwrap_or_default();
                request
                    .progress
                    .on_page_extracted(page_number, total_pages, images.len());
                PageRecord {
                    page_number,
                    raw_text,
                    images,
                }
            })
            .collect();
        Ok(pages)
    }
}

/// Spawn `tool` with the user password (if any) and caller-supplied args.
fn run(
    tool: &str,
    password: Option<&str>,
    configure: impl FnOnce(&mut Command),
) -> Result<Output, ExtractionError> {
    let mut cmd = Command::new(tool);
    if let Some(pw) = password {
        cmd.arg("-upw").arg(pw);
    }
    configure(&mut cmd);
    cmd.output().map_err(|e| ExtractionError::BackendFailed {
        backend: BackendKind::Poppler,
        detail: format!("could not run {tool}: {e}"),
    })
}

fn page_count(pdf_path: &Path, password: Option<&str>) -> Option<usize> {
    let output = run("pdfinfo", password, |cmd| {
        cmd.arg(pdf_path);
    })
    .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_page_count(&String::from_utf8_lossy(&output.stdout))
}

fn parse_page_count(pdfinfo: &str) -> Option<usize> {
    PAGES_RE
        .captures(pdfinfo)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Split `pdftotext` output into per-page texts.
///
/// With a known page count the result has exactly that many entries.
/// Otherwise the empty segment after the final form feed is dropped.
fn split_pages(text: &str, page_count: Option<usize>) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\x0c').map(str::to_string).collect();
    match page_count {
        Some(n) => pages.resize(n, String::new()),
        None => {
            if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
                pages.pop();
            }
        }
    }
    pages
}

/// One row of `pdfimages -list`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ListedImage {
    page: usize,
    num: usize,
    kind: String,
    width: u32,
    height: u32,
}

fn parse_image_list(listing: &str) -> Vec<ListedImage> {
    listing
        .lines()
        .skip_while(|line| !line.starts_with("---"))
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 5 {
                return None;
            }
            Some(ListedImage {
                page: cols[0].parse().ok()?,
                num: cols[1].parse().ok()?,
                kind: cols[2].to_string(),
                width: cols[3].parse().ok()?,
                height: cols[4].parse().ok()?,
            })
        })
        .collect()
}

/// `(page, num, extension)` from a file written by `pdfimages -p`.
fn parse_dumped_name(file_name: &str) -> Option<(usize, usize, String)> {
    let caps = DUMPED_IMAGE_RE.captures(file_name)?;
    Some((
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].to_ascii_lowercase(),
    ))
}

/// Dump every image into `images_dir`, grouped by page and indexed from 1.
///
/// Soft masks are dropped; they are alpha channels, not figures.
fn dump_images(
    pdf_path: &Path,
    images_dir: &Path,
    password: Option<&str>,
) -> Result<BTreeMap<usize, Vec<ImageRecord>>, String> {
    let listing = run("pdfimages", password, |cmd| {
        cmd.arg("-list").arg(pdf_path);
    })
    .map_err(|e| e.to_string())?;
    let listed: HashMap<usize, ListedImage> = parse_image_list(&String::from_utf8_lossy(&listing.stdout))
        .into_iter()
        .map(|row| (row.num, row))
        .collect();

    let staging = tempfile::Builder::new()
        .prefix(".pdfimages-")
        .tempdir_in(images_dir)
        .map_err(|e| format!("could not create staging directory: {e}"))?;
    let root = staging.path().join("img");
    let output = run("pdfimages", password, |cmd| {
        cmd.arg("-all").arg("-p").arg(pdf_path).arg(&root);
    })
    .map_err(|e| e.to_string())?;
    if !output.status.success() {
        return Err(format!(
            "pdfimages exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let mut dumped: Vec<(usize, usize, String, PathBuf)> = std::fs::read_dir(staging.path())
        .map_err(|e| e.to_string())?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let (page, num, ext) = parse_dumped_name(&name)?;
            Some((page, num, ext, entry.path()))
        })
        .collect();
    dumped.sort_by_key(|(page, num, _, _)| (*page, *num));
    place_images(dumped, &listed, images_dir)
}

/// Move staged dumps to their canonical names. On failure every image
/// already moved is removed again.
fn place_images(
    dumped: Vec<(usize, usize, String, PathBuf)>,
    listed: &HashMap<usize, ListedImage>,
    images_dir: &Path,
) -> Result<BTreeMap<usize, Vec<ImageRecord>>, String> {
    let mut by_page: BTreeMap<usize, Vec<ImageRecord>> = BTreeMap::new();
    for (page, num, ext, staged) in dumped {
        let row = listed.get(&num);
        if row.is_some_and(|r| r.kind == "smask") {
            continue;
        }
        let images = by_page.entry(page).or_default();
        let mut record = ImageRecord::stored(images_dir, page, images.len() + 1, ext);
        if let Some(row) = row {
            record = record.with_dimensions(row.width, row.height);
        }
        if let Err(e) = std::fs::rename(&staged, &record.path) {
            discard_images(by_page.values().flatten());
            return Err(format!("could not move {} into place: {e}", staged.display()));
        }
        images.push(record);
    }
    Ok(by_page)
}

/// Remove images attributed to pages past `total_pages`; nothing would
/// reference them.
fn discard_pages_beyond(images_by_page: &mut BTreeMap<usize, Vec<ImageRecord>>, total_pages: usize) {
    let orphans = images_by_page.split_off(&(total_pages + 1));
    if orphans.is_empty() {
        return;
    }
    warn!(
        "pdfimages reported images on {} page(s) beyond the text page count; dropping them",
        orphans.len()
    );
    discard_images(orphans.values().flatten());
}

fn discard_images<'a>(images: impl IntoIterator<Item = &'a ImageRecord>) {
    for image in images {
        if let Err(e) = std::fs::remove_file(&image.path) {
            debug!("could not remove {}: {}", image.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
page   num  type   width height color comp bpc  enc interp  object ID x-ppi y-ppi size ratio
--------------------------------------------------------------------------------------------
   1     0 image     800   600  rgb     3   8  jpeg   no        12  0    72    72 45.2K 3.2%
   1     1 smask     800   600  gray    1   8  image  no        12  0    72    72 2.1K 0.4%
   3     2 image     120    90  rgb     3   8  image  no        31  0   150   150 1.0K 3.1%
";

    #[test]
    fn parses_pdfinfo_page_count() {
        let info = "Title:          Tile\nPages:          12\nEncrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(12));
        assert_eq!(parse_page_count("Title: x\n"), None);
    }

    #[test]
    fn splits_on_form_feed_and_drops_trailing_segment() {
        let pages = split_pages("first\n\x0csecond\n\x0c", None);
        assert_eq!(pages, vec!["first\n".to_string(), "second\n".to_string()]);
    }

    #[test]
    fn split_honours_known_page_count() {
        let pages = split_pages("a\x0cb\x0c", Some(3));
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0], "a");
        assert_eq!(pages[1], "b");
        assert_eq!(pages[2], "");

        let pages = split_pages("a\x0cb\x0c", Some(1));
        assert_eq!(pages, vec!["a".to_string()]);
    }

    #[test]
    fn single_page_without_form_feed() {
        assert_eq!(split_pages("only page", None), vec!["only page".to_string()]);
    }

    #[test]
    fn parses_image_listing() {
        let rows = parse_image_list(LISTING);
        assert_eq!(rows.len(), 3);
        assert_eq!(
            rows[0],
            ListedImage {
                page: 1,
                num: 0,
                kind: "image".into(),
                width: 800,
                height: 600
            }
        );
        assert_eq!(rows[1].kind, "smask");
        assert_eq!((rows[2].page, rows[2].width, rows[2].height), (3, 120, 90));
    }

    #[test]
    fn listing_without_rows_is_empty() {
        assert!(parse_image_list("").is_empty());
        assert!(parse_image_list("page num type\n-----\n").is_empty());
    }

    #[test]
    fn parses_dumped_file_names() {
        assert_eq!(parse_dumped_name("img-003-012.jpg"), Some((3, 12, "jpg".into())));
        assert_eq!(parse_dumped_name("img-001-000.PNG"), Some((1, 0, "png".into())));
        assert_eq!(parse_dumped_name("other-001-000.png"), None);
        assert_eq!(parse_dumped_name("img-001.png"), None);
    }

    fn staged(dir: &Path, page: usize, num: usize) -> (usize, usize, String, PathBuf) {
        let path = dir.join(format!("img-{page:03}-{num:03}.png"));
        std::fs::write(&path, b"png").unwrap();
        (page, num, "png".to_string(), path)
    }

    #[test]
    fn staged_images_get_canonical_names_and_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let listed: HashMap<usize, ListedImage> = parse_image_list(LISTING)
            .into_iter()
            .map(|row| (row.num, row))
            .collect();
        let dumped = vec![
            staged(staging.path(), 1, 0),
            staged(staging.path(), 1, 1),
            staged(staging.path(), 3, 2),
        ];

        let by_page = place_images(dumped, &listed, dir.path()).unwrap();
        assert_eq!(by_page.len(), 2);
        assert_eq!(by_page[&1].len(), 1, "soft mask skipped");
        assert_eq!(by_page[&1][0].file_name, "page_1_img_1.png");
        assert_eq!((by_page[&1][0].width, by_page[&1][0].height), (Some(800), Some(600)));
        assert!(dir.path().join("page_3_img_1.png").is_file());
    }

    #[test]
    fn failed_move_removes_images_already_placed() {
        let dir = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let first = staged(staging.path(), 1, 0);
        let vanished = (2, 1, "png".to_string(), staging.path().join("img-002-001.png"));

        let err = place_images(vec![first, vanished], &HashMap::new(), dir.path()).unwrap_err();
        assert!(err.contains("could not move"));
        assert!(!dir.path().join("page_1_img_1.png").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn images_past_the_last_page_are_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let staging = tempfile::tempdir().unwrap();
        let dumped = vec![staged(staging.path(), 1, 0), staged(staging.path(), 4, 1)];
        let mut by_page = place_images(dumped, &HashMap::new(), dir.path()).unwrap();

        discard_pages_beyond(&mut by_page, 2);
        assert_eq!(by_page.keys().copied().collect::<Vec<_>>(), vec![1]);
        assert!(dir.path().join("page_1_img_1.png").is_file());
        assert!(!dir.path().join("page_4_img_1.png").exists());
    }

    #[test]
    fn missing_pdftotext_is_unavailable() {
        use crate::progress::NoopProgressCallback;
        let dir = tempfile::tempdir().unwrap();
        let request = ExtractionRequest {
            pdf_path: &dir.path().join("a.pdf"),
            images_dir: dir.path(),
            password: None,
            progress: &NoopProgressCallback,
        };
        let extractor = PopplerExtractor::new(SystemTools::default());
        assert!(matches!(
            extractor.extract(&request),
            Err(ExtractionError::BackendUnavailable(BackendKind::Poppler))
        ));
    }

    #[test]
    fn tool_entries_are_stable() {
        let tools = SystemTools {
            pdftotext: true,
            ..SystemTools::default()
        };
        let names: Vec<_> = tools.entries().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["pdftotext", "pdfimages", "pdftoppm", "pdfinfo"]);
        assert!(tools.entries()[0].1);
    }
}
