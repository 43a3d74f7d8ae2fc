//! PDF header detection and version validation.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// PDF header information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfHeader {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Byte offset of the `%PDF-` marker
    pub offset: usize,
}

impl std::fmt::Display for PdfHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// Producers sometimes prepend junk (mail headers, BOMs); the header may
/// start anywhere in this window.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// Detect the PDF header from a file path.
///
/// # Example
/// ```no_run
/// use pdfmd::detect::detect_header_from_path;
///
/// let header = detect_header_from_path("document.pdf").unwrap();
/// println!("PDF version: {}", header.version);
/// ```
pub fn detect_header_from_path<P: AsRef<Path>>(path: P) -> Result<PdfHeader> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(HEADER_SEARCH_WINDOW);
    file.take(HEADER_SEARCH_WINDOW as u64)
        .read_to_end(&mut head)?;
    detect_header(&head)
}

/// Detect the PDF header from bytes.
///
/// # Returns
/// * `Ok(PdfHeader)` if a `%PDF-x.y` marker with a 1.x or 2.x version is found
/// * `Err(Error::CorruptDocument)` if no header is present
/// * `Err(Error::UnsupportedVersion)` if the version is malformed or unknown
pub fn detect_header(data: &[u8]) -> Result<PdfHeader> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let offset = window
        .windows(PDF_MAGIC.len())
        .position(|w| w == PDF_MAGIC)
        .ok_or_else(|| Error::CorruptDocument("missing %PDF- header".to_string()))?;

    let start = offset + PDF_MAGIC.len();
    let version_bytes = data
        .get(start..start + VERSION_LEN)
        .ok_or_else(|| Error::CorruptDocument("truncated %PDF- header".to_string()))?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_supported_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(PdfHeader { version, offset })
}

/// Check if a version string is a supported `1.x` or `2.x` version.
fn is_supported_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3 && matches!(bytes[0], b'1' | b'2') && bytes[1] == b'.' && bytes[2].is_ascii_digit()
}

/// Check if bytes start like a PDF document.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_header(data).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_valid_pdf() {
        let data = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3";
        let header = detect_header(data).unwrap();
        assert_eq!(header.version, "1.7");
        assert_eq!(header.offset, 0);
    }

    #[test]
    fn test_detect_pdf_2_0() {
        let header = detect_header(b"%PDF-2.0\n").unwrap();
        assert_eq!(header.version, "2.0");
    }

    #[test]
    fn test_detect_header_after_junk() {
        let header = detect_header(b"garbage line\r\n%PDF-1.4\n").unwrap();
        assert_eq!(header.version, "1.4");
        assert_eq!(header.offset, 14);
    }

    #[test]
    fn test_detect_missing_header() {
        let result = detect_header(b"<!DOCTYPE html>");
        assert!(matches!(result, Err(Error::CorruptDocument(_))));
    }

    #[test]
    fn test_detect_truncated_header() {
        let result = detect_header(b"%PDF-1");
        assert!(matches!(result, Err(Error::CorruptDocument(_))));
    }

    #[test]
    fn test_detect_unsupported_version() {
        let result = detect_header(b"%PDF-3.0\n");
        assert!(matches!(result, Err(Error::UnsupportedVersion(v)) if v == "3.0"));

        let result = detect_header(b"%PDF-x.y\n");
        assert!(matches!(result, Err(Error::UnsupportedVersion(_))));
    }

    #[test]
    fn test_is_pdf_bytes() {
        assert!(is_pdf_bytes(b"%PDF-1.4\n"));
        assert!(!is_pdf_bytes(b"Not a PDF"));
        assert!(!is_pdf_bytes(b""));
    }
}
