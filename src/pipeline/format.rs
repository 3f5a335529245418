//! Markdown formatting: page records → one linear Markdown document.
//!
//! This is a pure function of its input. It never touches the file system
//! and never fails; every non-blank line lands in exactly one class.
//!
//! ## Heading heuristics
//!
//! Plain extracted text carries no structure, so headings are inferred from
//! typographic cues on each trimmed line, first match wins:
//!
//! 1. all-caps (at least one upper-case letter, no lower-case) and longer
//!    than 3 characters → `#` if shorter than 50 characters, else `##`
//! 2. `^\d+\.?\s+[A-Z]` (e.g. `3. Overview`) → `##`
//! 3. `^[A-Z][a-z]+.*:` and shorter than 80 characters
//!    (e.g. `Revision History:`) → `##`
//! 4. anything else is body text
//!
//! The rules are lossy: a short all-caps label in the middle of a paragraph
//! becomes a heading. Changing the precedence changes observable output, so
//! the order above is fixed.

use crate::output::PageRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;

static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.?\s+[A-Z]").unwrap());
static RE_LABEL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][a-z]+.*:").unwrap());

const ALL_CAPS_MIN_LEN: usize = 3;
const LEVEL1_MAX_LEN: usize = 50;
const LABEL_MAX_LEN: usize = 80;

/// Classification of one source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Whitespace-only; kept as a paragraph break.
    Blank,
    /// Markdown heading of the given level (1 or 2).
    Heading(u8),
    /// Ordinary text.
    Body,
}

/// Classify a single line of extracted text.
pub fn classify_line(line: &str) -> LineKind {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    let len = trimmed.chars().count();

    if is_all_caps(trimmed) && len > ALL_CAPS_MIN_LEN {
        return LineKind::Heading(if len < LEVEL1_MAX_LEN { 1 } else { 2 });
    }
    if RE_NUMBERED.is_match(trimmed) {
        return LineKind::Heading(2);
    }
    if RE_LABEL.is_match(trimmed) && len < LABEL_MAX_LEN {
        return LineKind::Heading(2);
    }
    LineKind::Body
}

/// At least one upper-case letter and no lower-case ones; digits,
/// punctuation and uncased scripts are ignored.
fn is_all_caps(s: &str) -> bool {
    let mut has_upper = false;
    for c in s.chars() {
        if c.is_lowercase() {
            return false;
        }
        has_upper |= c.is_uppercase();
    }
    has_upper
}

/// One rendered unit of the document. Each segment renders to one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Heading { level: u8, text: String },
    Paragraph(String),
    Blank,
    Image { alt: String, path: String },
    Caption(String),
    Emphasis(String),
    Rule,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Heading { level, text } => {
                write!(f, "{} {}", "#".repeat(*level as usize), text)
            }
            Segment::Paragraph(text) => f.write_str(text),
            Segment::Blank => Ok(()),
            Segment::Image { alt, path } => write!(f, "![{alt}]({path})"),
            Segment::Caption(text) | Segment::Emphasis(text) => write!(f, "*{text}*"),
            Segment::Rule => f.write_str("---"),
        }
    }
}

/// An assembled Markdown document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkdownDocument {
    segments: Vec<Segment>,
}

impl MarkdownDocument {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Render to text: one line per segment, trailing newline.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&segment.to_string());
            out.push('\n');
        }
        out
    }

    fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    fn push_heading(&mut self, level: u8, text: &str) {
        self.push(Segment::Blank);
        self.push(Segment::Heading {
            level,
            text: text.to_string(),
        });
        self.push(Segment::Blank);
    }
}

/// Build the document for `pages` converted from `source_file`.
///
/// `source_file` is the PDF's file name (or path); its stem becomes the
/// document title. Pages are emitted in ascending page number whatever the
/// input order.
pub fn build_document(pages: &[PageRecord], source_file: &str) -> MarkdownDocument {
    let mut doc = MarkdownDocument::default();
    let file_name = Path::new(source_file)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| source_file.to_string());

    doc.push(Segment::Heading {
        level: 1,
        text: document_title(&file_name),
    });
    doc.push(Segment::Blank);
    doc.push(Segment::Emphasis(format!("Converted from PDF: {file_name}")));
    doc.push(Segment::Blank);
    doc.push(Segment::Rule);
    doc.push(Segment::Blank);

    let mut ordered: Vec<&PageRecord> = pages.iter().collect();
    ordered.sort_by_key(|p| p.page_number);

    for (position, page) in ordered.into_iter().enumerate() {
        if position > 0 {
            doc.push(Segment::Blank);
            doc.push(Segment::Rule);
            doc.push(Segment::Blank);
            doc.push(Segment::Emphasis(format!("Page {}", page.page_number)));
            doc.push(Segment::Blank);
        }
        push_page_text(&mut doc, &page.raw_text);
        push_page_images(&mut doc, page);
    }

    doc
}

/// Convenience wrapper: build and render in one call.
pub fn format_markdown(pages: &[PageRecord], source_file: &str) -> String {
    build_document(pages, source_file).render()
}

fn push_page_text(doc: &mut MarkdownDocument, raw_text: &str) {
    if raw_text.is_empty() {
        return;
    }
    for line in raw_text.split('\n') {
        match classify_line(line) {
            LineKind::Blank => doc.push(Segment::Blank),
            LineKind::Heading(level) => doc.push_heading(level, line.trim()),
            LineKind::Body => doc.push(Segment::Paragraph(line.trim().to_string())),
        }
    }
}

fn push_page_images(doc: &mut MarkdownDocument, page: &PageRecord) {
    if page.images.is_empty() {
        return;
    }
    let mut images: Vec<_> = page.images.iter().collect();
    images.sort_by_key(|img| img.index_on_page);

    doc.push(Segment::Blank);
    for img in images {
        doc.push(Segment::Image {
            alt: format!("Page {}, Image {}", page.page_number, img.index_on_page),
            path: img.markdown_path(),
        });
        if let Some((w, h)) = img.dimensions() {
            doc.push(Segment::Caption(format!("Image dimensions: {w}x{h} pixels")));
        }
        doc.push(Segment::Blank);
    }
}

/// Title derived from a PDF file name: extension dropped, underscores turned
/// into spaces, then title-cased.
pub fn document_title(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = title_case(&stem.replace('_', " "));
    if title.trim().is_empty() {
        "Document".to_string()
    } else {
        title
    }
}

/// Upper-case the first cased letter of every run of cased letters and
/// lower-case the rest (`"pcie-tile v2"` → `"Pcie-Tile V2"`).
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        let cased = c.is_uppercase() || c.is_lowercase();
        if cased && prev_cased {
            out.extend(c.to_lowercase());
        } else if cased {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ImageRecord;
    use std::path::Path;

    fn page(n: usize, text: &str) -> PageRecord {
        PageRecord::new(n, text)
    }

    #[test]
    fn numbered_all_caps_is_level_one() {
        assert_eq!(classify_line("3. OVERVIEW"), LineKind::Heading(1));
    }

    #[test]
    fn label_with_colon_is_level_two() {
        assert_eq!(classify_line("Revision History:"), LineKind::Heading(2));
    }

    #[test]
    fn numbered_mixed_case_is_level_two() {
        assert_eq!(classify_line("3. Overview"), LineKind::Heading(2));
        assert_eq!(classify_line("12 Clock and Reset"), LineKind::Heading(2));
    }

    #[test]
    fn long_all_caps_is_level_two() {
        let line = "THIS IS A VERY LONG ALL CAPS LINE THAT KEEPS GOING ON";
        assert!(line.chars().count() >= 50);
        assert_eq!(classify_line(line), LineKind::Heading(2));
    }

    #[test]
    fn short_all_caps_is_body() {
        assert_eq!(classify_line("PCI"), LineKind::Body);
        assert_eq!(classify_line("PCIE"), LineKind::Heading(1));
    }

    #[test]
    fn digits_only_is_not_all_caps() {
        assert_eq!(classify_line("12345678"), LineKind::Body);
    }

    #[test]
    fn long_label_is_body() {
        let line = format!("Note: {}", "x".repeat(80));
        assert_eq!(classify_line(&line), LineKind::Body);
    }

    #[test]
    fn plain_sentence_is_body() {
        assert_eq!(
            classify_line("the tile forwards TLPs to the NOC."),
            LineKind::Body
        );
    }

    #[test]
    fn whitespace_is_blank() {
        assert_eq!(classify_line("   \t"), LineKind::Blank);
        assert_eq!(classify_line(""), LineKind::Blank);
    }

    #[test]
    fn classification_is_deterministic() {
        let lines = ["INTRODUCTION", "1. Scope", "Note: x", "body", "  "];
        let first: Vec<_> = lines.iter().map(|l| classify_line(l)).collect();
        let second: Vec<_> = lines.iter().map(|l| classify_line(l)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn header_from_file_name() {
        let md = format_markdown(&[], "docs/keraunos_pcie_tile.pdf");
        let lines: Vec<&str> = md.lines().collect();
        assert_eq!(lines[0], "# Keraunos Pcie Tile");
        assert_eq!(lines[2], "*Converted from PDF: keraunos_pcie_tile.pdf*");
        assert_eq!(lines[4], "---");
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(document_title("pcie-tile_v2.pdf"), "Pcie-Tile V2");
        assert_eq!(document_title("DATASHEET_final.pdf"), "Datasheet Final");
        assert_eq!(document_title("3d_model.pdf"), "3D Model");
        assert_eq!(document_title(".pdf"), ".Pdf");
        assert_eq!(document_title(""), "Document");
    }

    #[test]
    fn heading_surrounded_by_blank_lines() {
        let md = format_markdown(&[page(1, "intro text\nOVERVIEW\nmore text")], "a.pdf");
        assert!(md.contains("intro text\n\n# OVERVIEW\n\nmore text\n"), "got:\n{md}");
    }

    #[test]
    fn body_lines_are_trimmed() {
        let md = format_markdown(&[page(1, "   indented body   ")], "a.pdf");
        assert!(md.contains("\nindented body\n"));
    }

    #[test]
    fn image_reference_and_caption() {
        let img = ImageRecord::stored(Path::new("/out/images"), 2, 1, "png").with_dimensions(800, 600);
        let pages = vec![page(1, "first"), page(2, "second").with_images(vec![img])];
        let md = format_markdown(&pages, "a.pdf");
        let lines: Vec<&str> = md.lines().collect();
        let at = lines
            .iter()
            .position(|l| *l == "![Page 2, Image 1](images/page_2_img_1.png)")
            .expect("image reference present");
        assert_eq!(lines[at + 1], "*Image dimensions: 800x600 pixels*");
        let text_at = lines.iter().position(|l| *l == "second").unwrap();
        assert!(text_at < at, "images follow the page text");
    }

    #[test]
    fn caption_omitted_without_dimensions() {
        let img = ImageRecord::stored(Path::new("/out/images"), 1, 1, "jpg");
        let md = format_markdown(&[page(1, "").with_images(vec![img])], "a.pdf");
        assert!(md.contains("![Page 1, Image 1](images/page_1_img_1.jpg)"));
        assert!(!md.contains("Image dimensions"));
    }

    #[test]
    fn images_sorted_by_index() {
        let a = ImageRecord::stored(Path::new("/o"), 1, 2, "png");
        let b = ImageRecord::stored(Path::new("/o"), 1, 1, "png");
        let md = format_markdown(&[page(1, "").with_images(vec![a, b])], "a.pdf");
        let first = md.find("Image 1]").unwrap();
        let second = md.find("Image 2]").unwrap();
        assert!(first < second);
    }

    #[test]
    fn page_separator_only_after_first() {
        let md = format_markdown(&[page(1, "one"), page(2, "two")], "a.pdf");
        assert!(!md.contains("*Page 1*"));
        assert!(md.contains("\n---\n\n*Page 2*\n\ntwo\n"), "got:\n{md}");
    }

    #[test]
    fn out_of_order_pages_are_sorted() {
        let md = format_markdown(&[page(3, "three"), page(1, "one"), page(2, "two")], "a.pdf");
        let one = md.find("\none\n").unwrap();
        let two = md.find("*Page 2*").unwrap();
        let three = md.find("*Page 3*").unwrap();
        assert!(one < two && two < three);
    }

    #[test]
    fn empty_page_keeps_separator() {
        let md = format_markdown(&[page(1, "one"), page(2, ""), page(3, "three")], "a.pdf");
        let two = md.find("*Page 2*").unwrap();
        let three = md.find("*Page 3*").unwrap();
        let between = &md[two + "*Page 2*".len()..three];
        assert!(between.trim_matches(|c| c == '\n').trim() == "---", "got: {between:?}");
    }

    #[test]
    fn blank_lines_preserved() {
        let md = format_markdown(&[page(1, "a\n\n\nb")], "a.pdf");
        assert!(md.contains("\na\n\n\nb\n"));
    }

    #[test]
    fn document_segments_expose_structure() {
        let doc = build_document(&[page(1, "SCOPE\nbody")], "x.pdf");
        assert!(doc.segments().contains(&Segment::Heading {
            level: 1,
            text: "SCOPE".into()
        }));
        assert!(doc.segments().contains(&Segment::Paragraph("body".into())));
    }
}
