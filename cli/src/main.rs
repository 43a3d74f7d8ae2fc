//! pdfmd CLI - convert a PDF document to Markdown

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use pdfmd::{extract_file, save, ExtractOptions, ImageFormat};

#[derive(Parser, Debug)]
#[command(name = "pdfmd")]
#[command(version)]
#[command(about = "Convert PDF documents to Markdown", long_about = None)]
struct Cli {
    /// Input PDF file
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output Markdown file
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// 0-based page numbers to convert (all pages if omitted)
    #[arg(long, num_args = 1.., allow_negative_numbers = true, value_name = "N")]
    pages: Option<Vec<i64>>,

    /// Write images as files
    #[arg(long)]
    write_images: bool,

    /// Embed images as base64 data URIs
    #[arg(long)]
    embed_images: bool,

    /// Emit one chunk per page with a page header
    #[arg(long)]
    page_chunks: bool,

    /// Image resolution
    #[arg(long, default_value_t = 150)]
    dpi: u32,

    /// Directory for written images
    #[arg(long, value_name = "DIR", default_value = "images")]
    image_path: PathBuf,

    /// Image format (png, jpg, jpeg, bmp, tiff, pnm)
    #[arg(long, value_name = "FMT", default_value = "png")]
    image_format: String,

    /// Worker threads
    #[arg(long, env = "PDFMD_THREADS", value_name = "N")]
    threads: Option<usize>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => None,
        1 => Some(log::LevelFilter::Debug),
        _ => Some(log::LevelFilter::Trace),
    };
    let mut builder = env_logger::Builder::from_default_env();
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder.init();
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = build_options(cli)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("Processing {}", cli.input.display()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = extract_file(&cli.input, &options);
    spinner.finish_and_clear();
    let output = result?;

    save(&output, &cli.output)?;

    let warnings = output.warnings().len();
    if warnings > 0 {
        eprintln!(
            "{} {} advisory warning(s); run with -v or RUST_LOG=warn for details",
            "Warning:".yellow().bold(),
            warnings
        );
    }

    println!(
        "{}",
        format!("Successfully processed '{}'.", cli.input.display()).green()
    );
    println!("Output saved to '{}'.", cli.output.display());
    Ok(())
}

fn build_options(cli: &Cli) -> Result<ExtractOptions, Box<dyn std::error::Error>> {
    let format: ImageFormat = cli.image_format.parse()?;
    let mut options = ExtractOptions::new()
        .with_write_images(cli.write_images)
        .with_embed_images(cli.embed_images)
        .with_chunks(cli.page_chunks)
        .with_dpi(cli.dpi)
        .with_image_path(&cli.image_path)
        .with_image_format(format);

    if let Some(pages) = &cli.pages {
        options = options.with_pages(page_indices(pages));
    }
    if let Some(threads) = cli.threads {
        options = options.with_threads(threads);
    }
    Ok(options)
}

/// Negative numbers become out-of-range indices, so they are dropped by
/// page selection and an all-negative list fails like any empty selection.
fn page_indices(pages: &[i64]) -> Vec<usize> {
    pages
        .iter()
        .map(|&p| usize::try_from(p).unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::parse_from(["pdfmd", "in.pdf", "out.md"]);
        assert_eq!(cli.dpi, 150);
        assert_eq!(cli.image_path, PathBuf::from("images"));
        assert_eq!(cli.image_format, "png");
        assert!(cli.pages.is_none());
        assert!(!cli.page_chunks);
    }

    #[test]
    fn test_parse_pages_with_negatives() {
        let cli = Cli::parse_from(["pdfmd", "in.pdf", "out.md", "--pages", "2", "-1", "0"]);
        assert_eq!(cli.pages, Some(vec![2, -1, 0]));
        assert_eq!(page_indices(&[2, -1, 0]), vec![2, usize::MAX, 0]);
    }

    #[test]
    fn test_unknown_image_format_is_rejected() {
        let cli = Cli::parse_from(["pdfmd", "in.pdf", "out.md", "--image-format", "gif"]);
        assert!(build_options(&cli).is_err());
    }

    #[test]
    fn test_options_from_flags() {
        let cli = Cli::parse_from([
            "pdfmd",
            "in.pdf",
            "out.md",
            "--page-chunks",
            "--write-images",
            "--dpi",
            "300",
            "--image-format",
            "jpg",
        ]);
        let options = build_options(&cli).unwrap();
        assert!(options.chunked);
        assert!(options.write_images);
        assert_eq!(options.dpi, 300);
        assert_eq!(options.image_format, ImageFormat::Jpg);
    }
}
