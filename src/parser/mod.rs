//! PDF container parsing: syntax, objects, filters, cross-references and
//! the page tree.

mod document;
pub mod filters;
pub mod lexer;
pub mod object;
mod pages;
pub mod xref;

pub use document::PdfDocument;
pub use filters::{Decoded, ImageCodec};
pub use object::{decode_text_string, Dictionary, Object, ObjectId, Stream};
pub use pages::PdfPage;
