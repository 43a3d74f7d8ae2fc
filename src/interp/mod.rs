//! Content stream interpretation.
//!
//! Each page's content streams are parsed into operations and executed
//! against a graphics state machine, yielding positioned glyphs, painted
//! paths and placed images in drawing order.

pub mod cmap;
mod content;
pub mod encoding;
mod font;
mod interpreter;
mod metrics;
mod state;

pub use content::{parse_content, Operation};
pub use font::{DecodedChar, PdfFont};
pub use interpreter::{interpret_page, PageContent, MAX_FORM_DEPTH};
pub use metrics::StandardFamily;
pub use state::{GraphicsStack, GraphicsState, TextState};
