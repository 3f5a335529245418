//! `convert-pdf`: convert a local PDF or a Google Drive file to Markdown.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, runs one conversion and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use pdf2markdown::cli::{self, bold, cyan, dim, green, red, CliProgressCallback};
use pdf2markdown::{
    convert, BackendKind, ConversionConfig, ConversionOutcome, ConversionOutput,
    ConversionProgressCallback, Pdf2MdError, ProgressCallback,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 500;
const RULE_WIDTH: usize = 70;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert a local PDF file
  convert-pdf input_docs/datasheet.pdf

  # Convert from a Google Drive share URL
  convert-pdf "https://drive.google.com/file/d/FILE_ID/view?usp=sharing"

  # Convert from a bare Google Drive file ID
  convert-pdf FILE_ID

  # Private Drive file (OAuth, opens a browser the first time)
  convert-pdf FILE_ID --auth --credentials credentials.json

  # Specify the output directory
  convert-pdf input_docs/datasheet.pdf --output-dir my_output

  # Keep the downloaded PDF instead of deleting it
  convert-pdf "https://drive.google.com/file/d/FILE_ID/view" --keep-temp

  # Machine-readable result
  convert-pdf input_docs/datasheet.pdf --json

EXTRACTION BACKENDS (first available wins):
  pdfium       text + images   needs libpdfium (PDFIUM_LIB_PATH, exe dir, cwd, cache dir)
  plain-text   text only       built in (pdf-extract)
  poppler      text + images   needs pdftotext (+ pdfimages for images)

  Run `pdf2md-diagrams --check-deps` to see what is available.

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH   Path to libpdfium (file or directory)
  RUST_LOG          Override log filter (e.g. RUST_LOG=pdf2markdown=debug)
"#;

/// Convert PDF files or Google Drive links to Markdown.
#[derive(Parser, Debug)]
#[command(
    name = "convert-pdf",
    version,
    about = "Convert PDF files to Markdown. Supports local files and Google Drive links.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file path, Google Drive URL, or Google Drive file ID.
    input_source: String,

    /// Output directory for the Markdown file.
    #[arg(long, env = "PDF2MD_OUTPUT_DIR", default_value = "output_docs")]
    output_dir: PathBuf,

    /// Keep temporary downloaded files (don't auto-delete).
    #[arg(long, env = "PDF2MD_KEEP_TEMP")]
    keep_temp: bool,

    /// Use OAuth2 authentication for Google Drive (required for private files).
    #[arg(long, env = "PDF2MD_AUTH")]
    auth: bool,

    /// Path to the Google OAuth2 client secrets JSON file.
    #[arg(long, env = "PDF2MD_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Where the OAuth token is cached between runs.
    #[arg(long, env = "PDF2MD_TOKEN", default_value = "token.json")]
    token: PathBuf,

    /// Force an extraction backend: pdfium, plain-text or poppler.
    #[arg(long, env = "PDF2MD_BACKEND")]
    backend: Option<BackendKind>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MD_PASSWORD")]
    password: Option<String>,

    /// Seconds a download may stall (connect or no data) before giving up.
    #[arg(long, env = "PDF2MD_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print the result as JSON instead of the human summary.
    #[arg(long, env = "PDF2MD_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2MD_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    cli::init_tracing(cli.verbose, cli.quiet, show_progress);
    let chatty = !cli.quiet && !cli.json;

    if chatty {
        println!("{}", "=".repeat(RULE_WIDTH));
        println!("📄 {}", bold("PDF to Markdown Converter"));
        println!("{}", "=".repeat(RULE_WIDTH));
        println!();
        println!("📂 Input source: {}", cli.input_source);
        println!("📁 Output dir:   {}", cli.output_dir.display());
        println!();
    }

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress)?;

    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("Failed to create output directory {:?}", cli.output_dir))?;

    let result = convert(&cli.input_source, &config).await;
    let outcome = ConversionOutcome::from(&result);

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome).context("Failed to serialise result")?
        );
    } else {
        match &result {
            Ok(output) if !cli.quiet => print_success(output),
            Ok(_) => {}
            Err(e) => print_failure(e),
        }
    }

    Ok(if outcome.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .output_dir(&cli.output_dir)
        .keep_temp(cli.keep_temp)
        .use_auth(cli.auth)
        .credentials_file(&cli.credentials)
        .token_file(&cli.token)
        .download_timeout_secs(cli.download_timeout);

    if let Some(backend) = cli.backend {
        builder = builder.backend(backend);
    }
    if let Some(password) = &cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn print_success(output: &ConversionOutput) {
    let stats = &output.stats;
    println!("{}", "-".repeat(RULE_WIDTH));
    println!("{}", green("✅ CONVERSION SUCCESSFUL!"));
    println!();
    if output.source.downloaded {
        println!("📥 Downloaded:    {}", output.source.file_name);
        if let Some(kept) = &output.source.retained_path {
            println!("📥 Kept at:       {}", kept.display());
        }
    }
    println!("📝 Output file:   {}", bold(&output.output_path.display().to_string()));
    println!("⚙️  Backend:       {}", stats.backend);
    println!("📄 Pages:         {}", stats.total_pages);
    println!("🖼️  Images:        {}", stats.total_images);
    if stats.total_images > 0 {
        println!("📁 Images dir:    {}", output.images_dir.display());
    } else if !stats.backend.extracts_images() {
        println!("   {}", dim("(the selected backend extracts text only)"));
    }
    println!();
    println!("📏 Input size:    {}", cli::human_size(stats.input_bytes));
    println!("📏 Output size:   {}", cli::human_size(stats.output_bytes));
    println!("⏱  Duration:      {}ms", stats.total_duration_ms);
    println!();

    println!("👀 Preview (first {PREVIEW_CHARS} characters):");
    println!("{}", "=".repeat(RULE_WIDTH));
    let (head, truncated) = cli::preview(&output.markdown, PREVIEW_CHARS);
    println!("{head}");
    if truncated {
        println!("\n{}", dim("... (truncated)"));
    }
    println!("{}", "=".repeat(RULE_WIDTH));
}

fn print_failure(error: &Pdf2MdError) {
    eprintln!("{}", "-".repeat(RULE_WIDTH));
    eprintln!("{}", red("❌ CONVERSION FAILED!"));
    eprintln!();
    eprintln!("{} {}", red("Error:"), error);
    if let Pdf2MdError::Extraction(pdf2markdown::ExtractionError::NoBackendAvailable) = error {
        eprintln!("\n{}", cyan("Check what was detected with: pdf2md-diagrams --check-deps"));
    }
}
