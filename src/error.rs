//! Error types for the pdfmd library.

use std::io;
use thiserror::Error;

/// Result type alias for pdfmd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during PDF processing.
///
/// Structural failures raised while loading a document are fatal. Per-page
/// and per-image problems are not reported through this type; they are
/// collected as [`crate::model::Warning`]s in the page metadata.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The document has no recoverable structure.
    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    /// The PDF version in the header is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The document is encrypted and decryption is not supported.
    #[error("Document is encrypted")]
    EncryptedDocument,

    /// The page tree is cyclic or structurally invalid.
    #[error("Malformed page tree: {0}")]
    MalformedPageTree(String),

    /// A referenced object does not exist in the document.
    #[error("Missing object {0} {1} R")]
    MissingObject(u32, u16),

    /// Low-level syntax error at a byte offset.
    #[error("Syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset where the error was detected
        offset: usize,
        /// Description of the problem
        message: String,
    },

    /// A stream filter failed to decode its data.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The page filter is empty after bounds checking.
    #[error("No valid pages specified. Document has {page_count} pages.")]
    NoValidPages {
        /// Number of pages in the document
        page_count: usize,
    },

    /// A single image could not be decoded or re-encoded.
    #[error("Image decode failed for {name}: {reason}")]
    ImageDecodeFailed {
        /// Image resource name or label
        name: String,
        /// Reason for the failure
        reason: String,
    },

    /// An extraction option is invalid.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// Output rendering or serialization failed.
    #[error("Render error: {0}")]
    Render(String),

    /// Processing was cancelled or timed out.
    #[error("Extraction cancelled: {0}")]
    Cancelled(String),
}

impl Error {
    /// Create a missing-object error for an object id.
    pub fn missing(id: (u32, u16)) -> Self {
        Error::MissingObject(id.0, id.1)
    }

    /// Create a syntax error at the given offset.
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Error::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Whether this error is a structural loader failure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Error::CorruptDocument(_)
                | Error::UnsupportedVersion(_)
                | Error::EncryptedDocument
                | Error::MalformedPageTree(_)
        )
    }
}
