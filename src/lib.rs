//! # pdfmd
//!
//! PDF content extraction and Markdown reconstruction.
//!
//! Documents are parsed from scratch: cross-reference tables and streams,
//! filters, fonts and content streams. Positioned glyphs are then grouped
//! into headings, paragraphs, lists and tables in reading order and
//! emitted as Markdown, either as one string or as one chunk per page.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfmd::{extract_file, save, ExtractOptions};
//!
//! fn main() -> pdfmd::Result<()> {
//!     let options = ExtractOptions::new().with_chunks(true);
//!     let output = extract_file("document.pdf", &options)?;
//!     save(&output, "document.md")?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Robust loading**: xref streams, object streams, incremental
//!   updates, and object scanning when the cross-reference data is broken
//! - **Structure reconstruction**: headings by font size, lists, tables
//!   from ruling lines or column alignment, two-column reading order
//! - **Images**: decoded, resampled to a target DPI, written as files or
//!   embedded as data URIs
//! - **Parallel processing**: pages run on a rayon pool

pub mod detect;
pub mod error;
pub mod extract;
pub mod images;
pub mod interp;
pub mod layout;
pub mod model;
pub mod parser;
pub mod render;

#[cfg(test)]
mod testutil;

pub use detect::{detect_header, detect_header_from_path, is_pdf_bytes, PdfHeader};
pub use error::{Error, Result};
pub use extract::{extract, extract_file, CancelFlag, ExtractOptions};
pub use images::ImageFormat;
pub use layout::{LayoutConfig, TableConfig};
pub use model::{
    Block, BlockKind, ChunkMetadata, DocumentInfo, MarkdownOutput, Page, PageChunk, Table,
    TableRow, TextRun, Warning,
};
pub use parser::PdfDocument;
pub use render::{save, JsonFormat, RenderOptions};

/// Load a document and return its page count.
///
/// # Example
///
/// ```no_run
/// let pages = pdfmd::page_count("document.pdf").unwrap();
/// println!("{} pages", pages);
/// ```
pub fn page_count<P: AsRef<std::path::Path>>(path: P) -> Result<usize> {
    Ok(PdfDocument::load_file(path)?.page_count())
}
