//! `pdf2md-diagrams`: convert a local PDF to Markdown next to it, keeping
//! every embedded diagram and image.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use pdf2markdown::cli::{self, bold, dim, green, red, yellow, CliProgressCallback};
use pdf2markdown::{
    convert, inspect_capabilities, BackendKind, ConversionConfig, ConversionProgressCallback,
    ProgressCallback,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert PDF to Markdown (output next to the PDF)
  pdf2md-diagrams doc/keraunos_pcie_tile.pdf

  # Specify the output file
  pdf2md-diagrams input.pdf output.md

  # Write into a directory
  pdf2md-diagrams input.pdf -o output_dir/

  # Show which extraction backends are available
  pdf2md-diagrams --check-deps
"#;

/// Convert PDF to Markdown with diagram preservation.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-diagrams",
    version,
    about = "Convert PDF to Markdown with diagram preservation",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input PDF file path.
    input_pdf: Option<PathBuf>,

    /// Output Markdown file (default: same name as the PDF with .md extension).
    #[arg(value_name = "OUTPUT_MD")]
    output_positional: Option<PathBuf>,

    /// Output Markdown file path or directory.
    #[arg(short, long, env = "PDF2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Check for available extraction backends and tools, then exit.
    #[arg(long)]
    check_deps: bool,

    /// Force an extraction backend: pdfium, plain-text or poppler.
    #[arg(long, env = "PDF2MD_BACKEND")]
    backend: Option<BackendKind>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MD_PASSWORD")]
    password: Option<String>,

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

    let show_progress = !cli.quiet && !cli.no_progress && !cli.check_deps;
    cli::init_tracing(cli.verbose, cli.quiet, show_progress);

    if cli.check_deps {
        return check_deps().await;
    }

    let Some(input_pdf) = cli.input_pdf.clone() else {
        Cli::command()
            .error(
                clap::error::ErrorKind::MissingRequiredArgument,
                "input_pdf is required (unless using --check-deps)",
            )
            .exit();
    };

    let pdf_path = std::path::absolute(&input_pdf)
        .with_context(|| format!("Invalid input path {:?}", input_pdf))?;
    if !pdf_path.is_file() {
        eprintln!("\n{} PDF file not found: {}", red("❌ Error:"), pdf_path.display());
        return Ok(ExitCode::FAILURE);
    }

    let requested = cli.output.as_deref().or(cli.output_positional.as_deref());
    let output_path = std::path::absolute(cli::diagrams_output_path(&pdf_path, requested))
        .context("Invalid output path")?;
    let output_dir = output_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_default();

    if !cli.quiet {
        println!("📄 Input PDF:  {}", pdf_path.display());
        println!("📝 Output MD:  {}", output_path.display());
        println!("📁 Output dir: {}", output_dir.display());
        println!();
        println!("🔄 Processing PDF...");
    }

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let mut builder = ConversionConfig::builder()
        .output_dir(&output_dir)
        .output_file(&output_path);
    if let Some(backend) = cli.backend {
        builder = builder.backend(backend);
    }
    if let Some(password) = &cli.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    let config = builder.build().context("Invalid configuration")?;

    let pdf_arg = pdf_path.to_string_lossy().into_owned();
    match convert(&pdf_arg, &config).await {
        Ok(output) => {
            if !cli.quiet {
                let stats = &output.stats;
                println!("✅ Processed {} pages", stats.total_pages);
                if stats.total_images > 0 {
                    println!(
                        "🖼️  Extracted {} images to {}",
                        stats.total_images,
                        output.images_dir.display()
                    );
                }
                println!("✅ Markdown saved to: {}", output.output_path.display());
                println!("📊 Output size: {} bytes", cli::thousands(stats.output_bytes));
                println!("\n{}", green("✅ Conversion complete!"));
                println!("📄 Output: {}", bold(&output.output_path.display().to_string()));
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("\n{} {}", red("❌ Error:"), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn check_deps() -> Result<ExitCode> {
    println!("Checking dependencies...");
    let caps = inspect_capabilities()
        .await
        .context("Failed to probe extraction backends")?;
    print!("{}", cli::capability_report(&caps));

    if !caps.any_available() {
        println!("\n{}  No PDF extraction backend found!", yellow("⚠️"));
        println!("Install one of:");
        println!("  • the pdfium shared library (set PDFIUM_LIB_PATH=/path/to/libpdfium)");
        println!("  • poppler-utils (pdftotext, pdfimages)");
        println!("{}", dim("or rebuild with the `plain-text` feature."));
    }
    Ok(ExitCode::SUCCESS)
}
